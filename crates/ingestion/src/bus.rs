//! MQTT 消息总线客户端
//!
//! 基于 `rumqttc` 的 [`MessageSource`] 实现：
//! - `connect` 在有限次数内重试，直到收到 CONNACK
//! - `subscribe` 登记通配符订阅，每次重连成功后自动重新订阅
//! - `listen` 启动事件循环任务，逐条调用回调 (同一连接上不会并发)
//! - 连接丢失时指数退避重连，已存储的历史不受影响
//!
//! 连接状态通过 `tokio::sync::watch` 对外发布。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    is_valid_filter, parse_broker_address, BrokerConfig, BusMessage, ConnectionState,
    ContractError, MessageCallback, MessageSource,
};
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{IngestionError, Result};
use crate::retry::RetryPolicy;

/// 客户端请求队列容量
const REQUEST_CAPACITY: usize = 64;

/// 断开时等待事件循环冲刷 UNSUBSCRIBE/DISCONNECT 的时间
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// MQTT 消息总线客户端
pub struct MqttBusClient {
    config: BrokerConfig,
    retry: RetryPolicy,
    address: Option<String>,
    subscription: Option<String>,
    client: Option<AsyncClient>,
    eventloop: Option<EventLoop>,
    state: Arc<watch::Sender<ConnectionState>>,
    listening: Arc<AtomicBool>,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl MqttBusClient {
    /// 创建客户端 (尚未连接)
    pub fn new(config: BrokerConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            retry: RetryPolicy::from(&config.retry),
            config,
            address: None,
            subscription: None,
            client: None,
            eventloop: None,
            state: Arc::new(state),
            listening: Arc::new(AtomicBool::new(false)),
            shutdown: None,
            task: None,
        }
    }

    /// 订阅连接状态变化
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// 当前连接状态
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// 已登记的订阅过滤器
    pub fn subscription(&self) -> Option<&str> {
        self.subscription.as_deref()
    }

    /// 连接到 broker
    ///
    /// 每次尝试受 `connect_timeout` 限制；重试耗尽后返回
    /// [`IngestionError::ConnectionFailed`]。
    #[instrument(name = "bus_connect", skip(self), fields(client_id = %self.config.client_id))]
    pub async fn connect(&mut self, address: &str) -> Result<()> {
        if self.client.is_some() {
            debug!(address = %address, "Already connected");
            return Ok(());
        }

        let (host, port) = parse_broker_address(address)?;
        let mut options = MqttOptions::new(self.config.client_id.clone(), host, port);
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs));
        options.set_clean_session(true);

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        publish_state(&self.state, ConnectionState::Connecting);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let message = match timeout(self.retry.connect_timeout, wait_for_connack(&mut eventloop))
                .await
            {
                Ok(Ok(())) => break,
                Ok(Err(message)) => message,
                Err(_) => format!("no CONNACK within {:?}", self.retry.connect_timeout),
            };

            if !self.retry.should_retry(attempt) {
                publish_state(&self.state, ConnectionState::Disconnected);
                return Err(IngestionError::ConnectionFailed {
                    address: address.to_string(),
                    attempts: attempt,
                    message,
                });
            }

            let delay = self.retry.delay_for_attempt(attempt);
            warn!(
                address = %address,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %message,
                "Broker connect failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }

        info!(address = %address, attempts = attempt, "Connected to broker");
        publish_state(&self.state, ConnectionState::Connected);

        self.address = Some(address.to_string());
        self.client = Some(client);
        self.eventloop = Some(eventloop);
        Ok(())
    }

    /// 登记通配符订阅
    #[instrument(name = "bus_subscribe", skip(self))]
    pub async fn subscribe(&mut self, pattern: &str) -> Result<()> {
        if !is_valid_filter(pattern) {
            return Err(IngestionError::InvalidFilter {
                filter: pattern.to_string(),
            });
        }
        let client = self.client.as_ref().ok_or(IngestionError::NotConnected)?;

        client.subscribe(pattern, QoS::AtMostOnce).await?;
        info!(filter = %pattern, "Subscribed");

        self.subscription = Some(pattern.to_string());
        Ok(())
    }

    /// 取消订阅并断开，停止回调
    pub async fn disconnect(&mut self) -> Result<()> {
        MessageSource::stop(self).await.map_err(IngestionError::from)
    }
}

impl MessageSource for MqttBusClient {
    fn name(&self) -> &str {
        &self.config.client_id
    }

    async fn listen(&mut self, callback: MessageCallback) -> std::result::Result<(), ContractError> {
        if self.listening.load(Ordering::Acquire) {
            return Err(IngestionError::AlreadyListening {
                source_name: self.config.client_id.clone(),
            }
            .into());
        }
        let client = self.client.clone().ok_or(IngestionError::NotConnected)?;
        let eventloop = self.eventloop.take().ok_or(IngestionError::NotConnected)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.listening.store(true, Ordering::Release);

        let task = EventLoopTask {
            eventloop,
            client,
            subscription: self.subscription.clone(),
            callback,
            state: self.state.clone(),
            listening: self.listening.clone(),
            retry: self.retry,
            shutdown: shutdown_rx,
        };

        self.shutdown = Some(shutdown_tx);
        self.task = Some(tokio::spawn(task.run()));

        debug!(client_id = %self.config.client_id, "Event loop started");
        Ok(())
    }

    async fn stop(&mut self) -> std::result::Result<(), ContractError> {
        if !self.listening.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        if let Some(client) = self.client.take() {
            if let Some(filter) = &self.subscription {
                if let Err(e) = client.try_unsubscribe(filter.clone()) {
                    debug!(error = %e, "Unsubscribe request not queued");
                }
            }
            if let Err(e) = client.try_disconnect() {
                debug!(error = %e, "Disconnect request not queued");
            }
        }

        if let Some(mut task) = self.task.take() {
            if timeout(DISCONNECT_GRACE, &mut task).await.is_err() {
                debug!("Event loop did not flush disconnect in time, forcing shutdown");
                if let Some(shutdown) = self.shutdown.take() {
                    let _ = shutdown.send(true);
                }
                if let Err(e) = task.await {
                    warn!(error = %e, "Event loop task failed");
                }
            }
        }

        self.shutdown = None;
        publish_state(&self.state, ConnectionState::Disconnected);
        info!(
            address = self.address.as_deref().unwrap_or_default(),
            "Disconnected from broker"
        );
        Ok(())
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

/// 事件循环任务的全部状态
struct EventLoopTask {
    eventloop: EventLoop,
    client: AsyncClient,
    subscription: Option<String>,
    callback: MessageCallback,
    state: Arc<watch::Sender<ConnectionState>>,
    listening: Arc<AtomicBool>,
    retry: RetryPolicy,
    shutdown: watch::Receiver<bool>,
}

impl EventLoopTask {
    async fn run(mut self) {
        let mut failures: u32 = 0;

        loop {
            let event = tokio::select! {
                _ = self.shutdown.changed() => break,
                event = self.eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if self.listening.load(Ordering::Acquire) {
                        trace!(topic = %publish.topic, bytes = publish.payload.len(), "Publish received");
                        (self.callback)(BusMessage::new(publish.topic, publish.payload));
                    }
                }
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        warn!(code = ?ack.code, "Broker refused reconnect");
                        continue;
                    }
                    failures = 0;
                    info!("Reconnected to broker");
                    publish_state(&self.state, ConnectionState::Connected);
                    self.resubscribe();
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    debug!("Disconnect sent, leaving event loop");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    if !self.listening.load(Ordering::Acquire) {
                        break;
                    }

                    failures = failures.saturating_add(1);
                    let delay = self.retry.delay_for_attempt(failures);
                    publish_state(&self.state, ConnectionState::Reconnecting);
                    warn!(
                        error = %e,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        "Broker connection lost, reconnecting"
                    );

                    tokio::select! {
                        _ = self.shutdown.changed() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    fn resubscribe(&self) {
        let Some(filter) = &self.subscription else {
            return;
        };
        match self.client.try_subscribe(filter.clone(), QoS::AtMostOnce) {
            Ok(()) => debug!(filter = %filter, "Re-subscribed"),
            Err(e) => warn!(filter = %filter, error = %e, "Re-subscribe failed"),
        }
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> std::result::Result<(), String> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(())
                } else {
                    Err(format!("broker refused connection: {:?}", ack.code))
                };
            }
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }
}

fn publish_state(state: &watch::Sender<ConnectionState>, next: ConnectionState) {
    let previous = state.send_replace(next);
    if previous != next {
        debug!(from = %previous, to = %next, "Connection state changed");
        observability::record_connection_state(next);
    }
}
