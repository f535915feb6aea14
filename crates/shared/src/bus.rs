//! 事件总线
//!
//! 进程内实现的有序、至少一次投递队列原语。对外的 API 形态与常见
//! 消息中间件封装保持一致（publish / consumer.start(shutdown, handler)），
//! 处理语义由 handler 的返回值驱动：
//! - `Ok` 表示确认（ack），消息出队；
//! - `Err` 表示处理失败，消息按配置延迟后重投（delivery_count 递增）；
//! - 投递次数达到上限后，消息包装为死信信封发布到 `order.dlq` 并确认，
//!   避免坏消息无限重投。
//!
//! 顺序保证仅在单个队列内成立，`order.created` 与 `order.canceled`
//! 之间没有任何跨队列顺序假设。

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, watch};
use tracing::{debug, error, info, warn};

use crate::config::BusConfig;
use crate::error::RelayError;

// ---------------------------------------------------------------------------
// Topic 常量
// ---------------------------------------------------------------------------

/// 集中管理所有队列名称，防止字符串散落在各服务中导致拼写不一致
pub mod topics {
    pub const ORDER_CREATED: &str = "order.created";
    pub const ORDER_CANCELED: &str = "order.canceled";
    pub const DEAD_LETTER: &str = "order.dlq";
}

// ---------------------------------------------------------------------------
// QueueMessage
// ---------------------------------------------------------------------------

/// 队列中一条消息的统一表示
///
/// `offset` 在单个队列内单调递增；`delivery_count` 记录该消息已被
/// 投递给消费者的次数，用于死信判定。
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub topic: String,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub timestamp: DateTime<Utc>,
    pub delivery_count: u32,
}

impl QueueMessage {
    /// 将负载视为 UTF-8 字符串返回
    pub fn payload_str(&self) -> Result<&str, RelayError> {
        std::str::from_utf8(&self.payload)
            .map_err(|e| RelayError::Serialization(format!("负载非 UTF-8 编码: {e}")))
    }

    /// 将 JSON 格式负载反序列化为目标类型
    pub fn deserialize_payload<T: DeserializeOwned>(&self) -> Result<T, RelayError> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| RelayError::Serialization(format!("负载反序列化失败: {e}")))
    }
}

// ---------------------------------------------------------------------------
// DeadLetterMessage — 死信信封
// ---------------------------------------------------------------------------

/// 死信消息信封
///
/// 包装原始消息，附加失败原因、投递次数等元数据，
/// 供死信队列的消费方排查或人工介入。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterMessage {
    /// 原始消息标识（消息 key，缺失时用 "topic@offset"）
    pub message_id: String,
    /// 原始队列名
    pub source_topic: String,
    /// 原始消息内容（UTF-8 字符串，非 UTF-8 时为 lossy 转换结果）
    pub payload: String,
    /// 最后一次失败原因
    pub error: String,
    /// 已投递次数
    pub delivery_count: u32,
    /// 进入死信队列的时间
    pub failed_at: DateTime<Utc>,
}

impl DeadLetterMessage {
    fn from_message(msg: &QueueMessage, error: &RelayError) -> Self {
        let message_id = msg
            .key
            .clone()
            .unwrap_or_else(|| format!("{}@{}", msg.topic, msg.offset));

        Self {
            message_id,
            source_topic: msg.topic.clone(),
            payload: String::from_utf8_lossy(&msg.payload).into_owned(),
            error: error.to_string(),
            delivery_count: msg.delivery_count,
            failed_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// 单个队列：FIFO 缓冲 + 唤醒信号 + 偏移计数
struct TopicQueue {
    messages: Mutex<VecDeque<QueueMessage>>,
    notify: Notify,
    next_offset: AtomicI64,
}

impl TopicQueue {
    fn new() -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            next_offset: AtomicI64::new(0),
        }
    }
}

/// 事件总线句柄
///
/// Clone 共享同一组队列，发布方和消费方各持一份句柄即可，
/// 语义等同于共享同一个 broker 连接池。
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    queues: DashMap<String, Arc<TopicQueue>>,
    config: BusConfig,
}

impl EventBus {
    pub fn new(config: BusConfig) -> Self {
        Self {
            inner: Arc::new(BusInner {
                queues: DashMap::new(),
                config,
            }),
        }
    }

    /// 取出或创建指定队列
    fn queue(&self, topic: &str) -> Arc<TopicQueue> {
        self.inner
            .queues
            .entry(topic.to_string())
            .or_insert_with(|| Arc::new(TopicQueue::new()))
            .clone()
    }

    /// 发布原始字节消息，返回该消息在队列内的偏移
    pub fn publish(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: &[u8],
    ) -> Result<i64, RelayError> {
        let queue = self.queue(topic);
        let offset = queue.next_offset.fetch_add(1, Ordering::SeqCst);

        let msg = QueueMessage {
            topic: topic.to_string(),
            offset,
            key: key.map(String::from),
            payload: payload.to_vec(),
            timestamp: Utc::now(),
            delivery_count: 0,
        };

        queue.messages.lock().push_back(msg);
        queue.notify.notify_one();

        debug!(topic, offset, "消息已发布");
        Ok(offset)
    }

    /// 将值序列化为 JSON 后发布
    ///
    /// 序列化与入队拆分为两步，便于独立定位故障原因。
    pub fn publish_json<T: Serialize>(
        &self,
        topic: &str,
        key: Option<&str>,
        value: &T,
    ) -> Result<i64, RelayError> {
        let payload = serde_json::to_vec(value)
            .map_err(|e| RelayError::Queue(format!("序列化失败: {e}")))?;

        self.publish(topic, key, &payload)
    }

    /// 创建指定队列的消费者
    pub fn consumer(&self, topic: &str) -> QueueConsumer {
        QueueConsumer {
            topic: topic.to_string(),
            queue: self.queue(topic),
            bus: self.clone(),
        }
    }

    /// 队列当前积压的消息数（观测与测试用）
    pub fn depth(&self, topic: &str) -> usize {
        self.queue(topic).messages.lock().len()
    }
}

// ---------------------------------------------------------------------------
// QueueConsumer
// ---------------------------------------------------------------------------

/// 单队列消费者
///
/// 一次处理一条消息：上一条消息确认或重新入队之前不会拉取下一条，
/// 保证队列内的处理顺序与发布顺序一致。
pub struct QueueConsumer {
    topic: String,
    queue: Arc<TopicQueue>,
    bus: EventBus,
}

impl QueueConsumer {
    /// 启动消费循环
    ///
    /// 使用 `tokio::select!` 同时监听消息流和关闭信号：
    /// - handler 返回 `Ok` 时消息确认出队;
    /// - handler 返回 `Err` 或超时（processing_timeout_ms）时按策略重投或死信;
    /// - 关闭信号变为 `true` 时退出循环，确保正在执行的 handler 能自然完成。
    pub async fn start<F, Fut>(self, mut shutdown: watch::Receiver<bool>, handler: F)
    where
        F: Fn(QueueMessage) -> Fut,
        Fut: std::future::Future<Output = Result<(), RelayError>>,
    {
        let timeout = Duration::from_millis(self.bus.inner.config.processing_timeout_ms);

        info!(topic = %self.topic, "消费循环已启动");

        loop {
            tokio::select! {
                // 偏向关闭信号，保证收到关闭时能尽快退出
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(topic = %self.topic, "收到关闭信号，消费循环退出");
                        break;
                    }
                }

                msg = self.next_message() => {
                    debug!(
                        topic = %msg.topic,
                        offset = msg.offset,
                        delivery_count = msg.delivery_count,
                        "收到消息"
                    );

                    let result = match tokio::time::timeout(timeout, handler(msg.clone())).await {
                        Ok(r) => r,
                        Err(_) => Err(RelayError::Queue(format!(
                            "消息处理超时（{} 毫秒）",
                            timeout.as_millis()
                        ))),
                    };

                    match result {
                        Ok(()) => {
                            debug!(topic = %msg.topic, offset = msg.offset, "消息已确认");
                        }
                        Err(e) => self.handle_failure(msg, e).await,
                    }
                }
            }
        }
    }

    /// 处理失败后的重投或死信逻辑
    ///
    /// 投递次数未达上限：延迟后重新放回队首，保持队列内顺序；
    /// 达到上限：包装为死信信封发布到死信队列，消息视为已确认。
    async fn handle_failure(&self, mut msg: QueueMessage, err: RelayError) {
        msg.delivery_count += 1;
        let max = self.bus.inner.config.max_deliveries;

        if msg.delivery_count >= max || self.topic == topics::DEAD_LETTER {
            // 死信队列自身的消息不再二次死信，直接丢弃并记录
            if self.topic == topics::DEAD_LETTER {
                error!(
                    topic = %self.topic,
                    offset = msg.offset,
                    error = %err,
                    "死信消息处理失败，放弃该消息"
                );
                return;
            }

            error!(
                topic = %self.topic,
                offset = msg.offset,
                delivery_count = msg.delivery_count,
                error = %err,
                "投递次数达到上限，消息进入死信队列"
            );

            let dead_letter = DeadLetterMessage::from_message(&msg, &err);
            metrics::counter!("reassignment_dead_letter_total").increment(1);

            if let Err(publish_err) = self.bus.publish_json(
                topics::DEAD_LETTER,
                Some(dead_letter.message_id.as_str()),
                &dead_letter,
            ) {
                error!(
                    message_id = %dead_letter.message_id,
                    error = %publish_err,
                    "发送到死信队列失败，消息可能丢失"
                );
            }
            return;
        }

        warn!(
            topic = %self.topic,
            offset = msg.offset,
            delivery_count = msg.delivery_count,
            max_deliveries = max,
            error = %err,
            "消息处理失败，稍后重投"
        );

        tokio::time::sleep(Duration::from_millis(
            self.bus.inner.config.redelivery_delay_ms,
        ))
        .await;

        // 放回队首保证重投先于后续消息被处理
        self.queue.messages.lock().push_front(msg);
        self.queue.notify.notify_one();
    }

    /// 等待并取出下一条消息
    ///
    /// Notify 在无等待者时保留一次许可，publish 与本方法之间不会丢失唤醒。
    async fn next_message(&self) -> QueueMessage {
        loop {
            if let Some(msg) = self.queue.messages.lock().pop_front() {
                return msg;
            }
            self.queue.notify.notified().await;
        }
    }
}
