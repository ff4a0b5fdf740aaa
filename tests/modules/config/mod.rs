//! 配置模块测试

mod integration;
