//! 调速器模块测试
