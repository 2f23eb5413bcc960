//! Neurosity headsets through an external raw-brainwave source.
//!
//! The vendor SDK is not something this crate links against. A companion
//! bridge runs the SDK's raw brainwave subscription and forwards every epoch
//! as one line of JSON:
//!
//! ```text
//! {"data": [[…ch0…], […ch1…], …],
//!  "info": {"channelNames": ["CP3", …], "samplingRate": 256, "startTime": 1700000000000},
//!  "quality": [[1, 1, …], …]}
//! ```
//!
//! Each epoch becomes one frame per channel. Lines that do not parse are
//! logged and skipped.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use super::{EegAdapter, NotificationPipeline};
use crate::broadcast::{Listener, Subscription};
use crate::error::AdapterError;
use crate::protocol::NEUROSITY_CHANNEL_NAMES;
use crate::types::{now_ms, AdapterKind, DeviceInfo, DeviceType, EegFrame};

/// Line-oriented reader carrying raw brainwave epochs.
pub type EpochReader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Opens the raw brainwave stream of one headset.
#[async_trait]
pub trait BrainwaveSource: Send {
    async fn open(&mut self) -> Result<(DeviceInfo, EpochReader), AdapterError>;
}

/// Bridge process reachable over TCP.
pub struct TcpBridge {
    addr: String,
    timeout: Duration,
}

impl TcpBridge {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }
}

#[async_trait]
impl BrainwaveSource for TcpBridge {
    async fn open(&mut self) -> Result<(DeviceInfo, EpochReader), AdapterError> {
        log::info!("Connecting to Neurosity bridge at {}", self.addr);
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| AdapterError::ConnectTimeout {
                device: self.addr.clone(),
                timeout_secs: self.timeout.as_secs(),
            })??;
        let info = DeviceInfo::new(self.addr.clone(), "Neurosity Crown", DeviceType::Neurosity);
        Ok((info, Box::new(BufReader::new(stream))))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpochInfo {
    #[serde(default)]
    channel_names: Vec<String>,
    #[serde(default)]
    start_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawEpoch {
    data: Vec<Vec<f64>>,
    info: EpochInfo,
    #[serde(default)]
    quality: Option<Vec<Vec<u8>>>,
}

/// Broadcast one JSON epoch line. Returns the number of frames emitted.
fn dispatch_epoch(pipeline: &NotificationPipeline, line: &str) -> usize {
    let epoch: RawEpoch = match serde_json::from_str(line) {
        Ok(epoch) => epoch,
        Err(e) => {
            log::warn!("Skipping malformed brainwave epoch: {e}");
            return 0;
        }
    };

    let timestamp = epoch.info.start_time.unwrap_or_else(now_ms);
    let mut quality = epoch.quality.map(|q| q.into_iter());
    let mut emitted = 0;
    for (i, samples) in epoch.data.into_iter().enumerate() {
        let channel = epoch
            .info
            .channel_names
            .get(i)
            .cloned()
            .or_else(|| NEUROSITY_CHANNEL_NAMES.get(i).map(|s| s.to_string()))
            .unwrap_or_else(|| format!("CH{i}"));
        let flags = quality.as_mut().and_then(|q| q.next());
        if pipeline.emit_samples(DeviceType::Neurosity, &channel, samples, timestamp, flags) {
            emitted += 1;
        }
    }
    emitted
}

pub struct NeurosityAdapter {
    source: Box<dyn BrainwaveSource>,
    pipeline: NotificationPipeline,
    info: Option<DeviceInfo>,
    reader: Option<EpochReader>,
    reader_task: Option<JoinHandle<()>>,
}

impl NeurosityAdapter {
    pub fn new(source: Box<dyn BrainwaveSource>) -> Self {
        Self {
            source,
            pipeline: NotificationPipeline::new(AdapterKind::Neurosity),
            info: None,
            reader: None,
            reader_task: None,
        }
    }
}

#[async_trait]
impl EegAdapter for NeurosityAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Neurosity
    }

    fn device_info(&self) -> Option<&DeviceInfo> {
        self.info.as_ref()
    }

    async fn connect(&mut self) -> Result<DeviceInfo, AdapterError> {
        if let Some(info) = &self.info {
            return Ok(info.clone());
        }
        let (info, reader) = self.source.open().await?;
        log::info!("Neurosity source ready: {}", info.name);
        self.reader = Some(reader);
        self.info = Some(info.clone());
        Ok(info)
    }

    async fn start(&mut self) -> Result<(), AdapterError> {
        if self.info.is_none() {
            return Err(AdapterError::NotConnected);
        }
        self.pipeline.set_running(true);

        // The reader is consumed by the first start; later starts just resume
        if let Some(reader) = self.reader.take() {
            let pipeline = self.pipeline.clone();
            self.reader_task = Some(tokio::spawn(async move {
                let mut lines = reader.lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) if line.trim().is_empty() => continue,
                        Ok(Some(line)) => {
                            dispatch_epoch(&pipeline, &line);
                        }
                        Ok(None) => {
                            log::info!("Brainwave stream closed by source");
                            break;
                        }
                        Err(e) => {
                            log::warn!("Brainwave stream read failed: {e}");
                            break;
                        }
                    }
                }
            }));
        }
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), AdapterError> {
        if self.info.is_none() {
            return Err(AdapterError::NotConnected);
        }
        self.pipeline.set_running(false);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), AdapterError> {
        self.pipeline.set_running(false);
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        self.reader = None;
        if let Some(info) = self.info.take() {
            log::info!("Neurosity source closed: {}", info.name);
        }
        Ok(())
    }

    fn on_data(&self, listener: Listener<EegFrame>) -> Subscription {
        self.pipeline.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncWriteExt, DuplexStream};

    struct DuplexSource {
        reader: Option<DuplexStream>,
    }

    #[async_trait]
    impl BrainwaveSource for DuplexSource {
        async fn open(&mut self) -> Result<(DeviceInfo, EpochReader), AdapterError> {
            let reader = self.reader.take().ok_or(AdapterError::NotConnected)?;
            let info = DeviceInfo::new("duplex", "Crown-test", DeviceType::Neurosity);
            Ok((info, Box::new(BufReader::new(reader))))
        }
    }

    #[test]
    fn test_dispatch_epoch_one_frame_per_channel() {
        let pipeline = NotificationPipeline::new(AdapterKind::Neurosity);
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = frames.clone();
        let _sub = pipeline.subscribe(Box::new(move |f: &EegFrame| {
            sink.lock().unwrap().push(f.clone());
        }));
        pipeline.set_running(true);

        let line = r#"{"data": [[1.0, 2.0], [3.0, 4.0]],
                       "info": {"channelNames": ["CP3", "C3"], "samplingRate": 256, "startTime": 1000},
                       "quality": [[1, 1], [0, 1]]}"#;
        assert_eq!(dispatch_epoch(&pipeline, line), 2);

        let frames = frames.lock().unwrap();
        assert_eq!(frames[0].channel, "CP3");
        assert_eq!(frames[1].samples, vec![3.0, 4.0]);
        assert_eq!(frames[1].quality, Some(vec![0, 1]));
        assert_eq!(frames[0].timestamp, 1000.0);
        assert_eq!(frames[0].device_type, DeviceType::Neurosity);
    }

    #[test]
    fn test_dispatch_epoch_defaults_channel_names() {
        let pipeline = NotificationPipeline::new(AdapterKind::Neurosity);
        pipeline.set_running(true);
        let channels = Arc::new(Mutex::new(Vec::new()));
        let sink = channels.clone();
        let _sub = pipeline.subscribe(Box::new(move |f: &EegFrame| {
            sink.lock().unwrap().push(f.channel.clone());
        }));

        dispatch_epoch(&pipeline, r#"{"data": [[1.0], [2.0]], "info": {}}"#);
        assert_eq!(*channels.lock().unwrap(), vec!["CP3".to_string(), "C3".to_string()]);
    }

    #[test]
    fn test_malformed_epoch_skipped() {
        let pipeline = NotificationPipeline::new(AdapterKind::Neurosity);
        pipeline.set_running(true);
        assert_eq!(dispatch_epoch(&pipeline, "{not json"), 0);
        assert_eq!(dispatch_epoch(&pipeline, r#"{"info": {}}"#), 0);
    }

    #[tokio::test]
    async fn test_streams_from_source() {
        let (mut writer, reader) = tokio::io::duplex(4096);
        let mut adapter = NeurosityAdapter::new(Box::new(DuplexSource {
            reader: Some(reader),
        }));

        let count = Arc::new(Mutex::new(0usize));
        let c = count.clone();
        let _sub = adapter.on_data(Box::new(move |_| {
            *c.lock().unwrap() += 1;
        }));

        assert!(matches!(adapter.start().await, Err(AdapterError::NotConnected)));
        let info = adapter.connect().await.unwrap();
        assert_eq!(info.channel_count, 8);
        adapter.start().await.unwrap();

        writer
            .write_all(b"{\"data\": [[1.0], [2.0], [3.0]], \"info\": {}}\n")
            .await
            .unwrap();
        writer.write_all(b"garbage\n").await.unwrap();
        writer.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(*count.lock().unwrap(), 3);
        assert!(adapter.stop().await.is_ok());
        assert!(adapter.stop().await.is_ok());
    }
}
