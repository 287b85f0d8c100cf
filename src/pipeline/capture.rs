//! 采集协作者接口
//!
//! 采集端每帧给出一块预览分辨率 RGBA 缓冲, 流水线复制完像素后必须尽快归还.

use crossbeam_channel::{bounded, Receiver, Sender};

/// 会话参数 (会话开始时由采集端给出)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionParams {
    pub preview_width: u32,
    pub preview_height: u32,
    /// 传感器相对屏幕的旋转角度 (度)
    pub sensor_orientation: i32,
}

/// 一帧采集数据
pub trait CapturedFrame {
    fn rgba(&self) -> &[u8];
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// 归还采集缓冲, 之后采集端可以复用它
    fn release(self);
}

/// 自有内存的帧, 归还即释放
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedFrame {
    pub rgba_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl CapturedFrame for OwnedFrame {
    fn rgba(&self) -> &[u8] {
        &self.rgba_data
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn release(self) {}
}

/// 固定数量的采集缓冲池
///
/// 缓冲全部借出时采集端拿不到新缓冲, 只能丢帧; 因此流水线必须及时归还.
pub struct FramePool {
    width: u32,
    height: u32,
    free_tx: Sender<Vec<u8>>,
    free_rx: Receiver<Vec<u8>>,
}

impl FramePool {
    pub fn new(width: u32, height: u32, buffers: usize) -> Self {
        let (free_tx, free_rx) = bounded(buffers);
        for _ in 0..buffers {
            let _ = free_tx.try_send(vec![0; (width as usize) * (height as usize) * 4]);
        }
        Self {
            width,
            height,
            free_tx,
            free_rx,
        }
    }

    /// 取一块空闲缓冲, 没有空闲缓冲时返回 `None`
    pub fn acquire(&self) -> Option<PooledFrame> {
        let rgba_data = self.free_rx.try_recv().ok()?;
        Some(PooledFrame {
            rgba_data,
            width: self.width,
            height: self.height,
            home: self.free_tx.clone(),
        })
    }

    /// 当前空闲缓冲数量
    pub fn available(&self) -> usize {
        self.free_rx.len()
    }
}

/// 从 `FramePool` 借出的帧, `release` 后回到池中
pub struct PooledFrame {
    rgba_data: Vec<u8>,
    width: u32,
    height: u32,
    home: Sender<Vec<u8>>,
}

impl PooledFrame {
    pub fn rgba_mut(&mut self) -> &mut [u8] {
        &mut self.rgba_data
    }
}

impl CapturedFrame for PooledFrame {
    fn rgba(&self) -> &[u8] {
        &self.rgba_data
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn release(self) {
        let _ = self.home.try_send(self.rgba_data);
    }
}
