//! 嵌入向量批量计算端到端测试
//!
//! 模拟一个嵌入服务：每次计量调用前通过调速器申请准入，
//! 根据用量快照决定批量调用还是逐条调用，逐条调用之间按用量调整间隔。

use crate::common::*;
use quotagate::{estimate_batch_tokens, estimate_tokens, RateGovernor, UsageSnapshot};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const EMBEDDING_DIMENSION: usize = 8;

/// 模拟的第三方嵌入接口
#[derive(Default)]
struct FakeEmbeddingClient {
    single_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    fail_batches: AtomicBool,
}

impl FakeEmbeddingClient {
    async fn embed(&self, text: &str) -> Vec<f32> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        vec![text.len() as f32; EMBEDDING_DIMENSION]
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, String> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_batches.load(Ordering::SeqCst) {
            return Err("批量接口暂时不可用".to_string());
        }
        Ok(texts
            .iter()
            .map(|text| vec![text.len() as f32; EMBEDDING_DIMENSION])
            .collect())
    }
}

/// 连通性检查结果
#[derive(Debug, PartialEq)]
enum ConnectionCheck {
    Success { dimension: usize, tokens_used: u64 },
    RateLimited(UsageSnapshot),
}

/// 使用调速器的嵌入服务
struct EmbeddingService {
    governor: Arc<RateGovernor>,
    client: FakeEmbeddingClient,
}

impl EmbeddingService {
    fn new(governor: Arc<RateGovernor>) -> Self {
        Self {
            governor,
            client: FakeEmbeddingClient::default(),
        }
    }

    async fn compute_embedding(&self, text: &str) -> Vec<f32> {
        self.governor
            .call(estimate_tokens(text), || self.client.embed(text))
            .await
    }

    async fn compute_embeddings(&self, texts: &[String]) -> Vec<Vec<f32>> {
        if texts.is_empty() {
            return Vec::new();
        }

        let total_cost = estimate_batch_tokens(texts);
        if self.governor.status().fits_batch(texts.len(), total_cost) {
            let batch = self
                .governor
                .call(total_cost, || self.client.embed_batch(texts))
                .await;
            if let Ok(embeddings) = batch {
                return embeddings;
            }
        }

        self.compute_individually(texts).await
    }

    async fn compute_individually(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            embeddings.push(self.compute_embedding(text).await);

            if i + 1 < texts.len() {
                tokio::time::sleep(self.governor.status().pacing_delay()).await;
            }
        }
        embeddings
    }

    async fn check_connection(&self) -> ConnectionCheck {
        let status = self.governor.status();
        if status.requests_exhausted() {
            return ConnectionCheck::RateLimited(status);
        }

        let text = "test";
        let embedding = self.compute_embedding(text).await;
        ConnectionCheck::Success {
            dimension: embedding.len(),
            tokens_used: estimate_tokens(text),
        }
    }

    fn single_calls(&self) -> usize {
        self.client.single_calls.load(Ordering::SeqCst)
    }

    fn batch_calls(&self) -> usize {
        self.client.batch_calls.load(Ordering::SeqCst)
    }
}

fn questions(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("How do I configure integration number {}?", i))
        .collect()
}

/// 小批量在额度充足时走一次批量调用
#[tokio::test(start_paused = true)]
async fn test_small_batch_uses_single_batch_call() {
    let service = EmbeddingService::new(create_governor(45, 1_000, 200_000, 1_000_000));
    let texts = questions(5);

    let embeddings = service.compute_embeddings(&texts).await;

    assert_eq!(embeddings.len(), 5);
    assert_eq!(service.batch_calls(), 1);
    assert_eq!(service.single_calls(), 0);

    let status = service.governor.status();
    assert_eq!(status.rpm.current, 1);
    assert_eq!(status.tpm.current, estimate_batch_tokens(&texts));
}

/// 超过批量条数上限时逐条调用，并按低用量间隔节奏发出
#[tokio::test(start_paused = true)]
async fn test_large_batch_falls_back_to_paced_calls() {
    let service = EmbeddingService::new(create_governor(45, 1_000, 200_000, 1_000_000));
    let texts = questions(12);
    let start = Instant::now();

    let embeddings = service.compute_embeddings(&texts).await;

    assert_eq!(embeddings.len(), 12);
    assert_eq!(service.batch_calls(), 0);
    assert_eq!(service.single_calls(), 12);
    // 12/45 始终低于 0.6，每次间隔 1 秒
    assert_waited(start.elapsed(), Duration::from_secs(11));
    assert_eq!(service.governor.status().rpm.current, 12);
}

/// 低 RPM 上限下逐条调用会被调速器限流
#[tokio::test(start_paused = true)]
async fn test_paced_calls_throttled_under_low_rpm() {
    let service = EmbeddingService::new(create_governor(5, 1_000, 200_000, 1_000_000));
    let texts = questions(12);
    let start = Instant::now();

    let embeddings = service.compute_embeddings(&texts).await;

    assert_eq!(embeddings.len(), 12);
    assert_eq!(service.single_calls(), 12);
    assert!(start.elapsed() > Duration::from_secs(60));
    assert_within_ceilings(&service.governor.status());
    assert_eq!(service.governor.status().rpd.current, 12);
}

/// 批量调用失败时回退为逐条调用
#[tokio::test(start_paused = true)]
async fn test_failed_batch_falls_back_to_individual_calls() {
    let service = EmbeddingService::new(create_governor(45, 1_000, 200_000, 1_000_000));
    service.client.fail_batches.store(true, Ordering::SeqCst);
    let texts = questions(3);

    let embeddings = service.compute_embeddings(&texts).await;

    assert_eq!(embeddings.len(), 3);
    assert_eq!(service.batch_calls(), 1);
    assert_eq!(service.single_calls(), 3);
    // 失败的批量调用同样计入用量
    assert_eq!(service.governor.status().rpm.current, 4);
}

/// token 余量不足以容纳整批时不走批量调用
#[tokio::test(start_paused = true)]
async fn test_batch_skipped_when_tokens_short() {
    let service = EmbeddingService::new(create_governor(45, 1_000, 20, 1_000_000));
    let texts = questions(2);
    assert!(estimate_batch_tokens(&texts) >= 20);

    service.compute_embeddings(&texts).await;

    assert_eq!(service.batch_calls(), 0);
    assert_eq!(service.single_calls(), 2);
}

/// 每分钟请求额度用尽时连通性检查直接返回限流状态
#[tokio::test(start_paused = true)]
async fn test_connection_check_preflight() {
    let service = EmbeddingService::new(create_governor(2, 1_000, 200_000, 1_000_000));

    assert_eq!(
        service.check_connection().await,
        ConnectionCheck::Success {
            dimension: EMBEDDING_DIMENSION,
            tokens_used: 1,
        }
    );
    service.compute_embedding("warm up").await;

    match service.check_connection().await {
        ConnectionCheck::RateLimited(status) => {
            assert_eq!(status.rpm.remaining, 0);
            assert!(!status.recommendations().is_empty());
        }
        other => panic!("应返回限流状态: {:?}", other),
    }
    assert_eq!(service.single_calls(), 2);
}

/// 空输入不发出任何调用
#[tokio::test(start_paused = true)]
async fn test_empty_input_makes_no_calls() {
    let service = EmbeddingService::new(create_governor(45, 1_000, 200_000, 1_000_000));

    assert!(service.compute_embeddings(&[]).await.is_empty());
    assert_eq!(service.governor.status().rpm.current, 0);
}
