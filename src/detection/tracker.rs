//! 跟踪/渲染协作者接口
//! Tracking and display-refresh collaborators

use crossbeam_channel::Sender;

use super::types::Detection;

/// 跟踪器: 接收预览坐标下的检测结果, 内部平滑/持久化/绘制不在本库范围内
pub trait DetectionTracker: Send {
    /// 会话开始时调用一次, 告知预览尺寸与传感器旋转角度 (用于映射到画布)
    fn set_frame_configuration(
        &mut self,
        _preview_width: u32,
        _preview_height: u32,
        _sensor_orientation: i32,
    ) {
    }

    /// 每个成功完成的检测任务调用一次, `frame_id` 严格递增
    fn track_results(&mut self, detections: Vec<Detection>, frame_id: u64);
}

impl<T: DetectionTracker + ?Sized> DetectionTracker for Box<T> {
    fn set_frame_configuration(
        &mut self,
        preview_width: u32,
        preview_height: u32,
        sensor_orientation: i32,
    ) {
        (**self).set_frame_configuration(preview_width, preview_height, sensor_orientation)
    }

    fn track_results(&mut self, detections: Vec<Detection>, frame_id: u64) {
        (**self).track_results(detections, frame_id)
    }
}

/// 显示刷新信号 (非阻塞)
pub trait RefreshSignal: Send + Sync {
    fn request_refresh(&self);
}

/// 容量为1的通道即可合并多次刷新请求
impl RefreshSignal for Sender<()> {
    fn request_refresh(&self) {
        // 已有未处理的刷新请求(Full)或渲染端已退出(Disconnected)都无需处理
        let _ = self.try_send(());
    }
}

/// 不需要刷新的场景 (离线回放/测试)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRefresh;

impl RefreshSignal for NoRefresh {
    fn request_refresh(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn channel_refresh_never_blocks() {
        let (tx, rx) = bounded(1);
        for _ in 0..10 {
            tx.request_refresh();
        }
        assert_eq!(rx.try_iter().count(), 1);

        drop(rx);
        tx.request_refresh();
    }

    #[derive(Default)]
    struct Canvas {
        frame: Option<(u32, u32, i32)>,
    }

    impl DetectionTracker for Canvas {
        fn set_frame_configuration(&mut self, w: u32, h: u32, orientation: i32) {
            self.frame = Some((w, h, orientation));
        }

        fn track_results(&mut self, _detections: Vec<Detection>, _frame_id: u64) {}
    }

    #[test]
    fn boxed_tracker_forwards_frame_configuration() {
        let mut boxed: Box<Canvas> = Box::default();
        boxed.set_frame_configuration(640, 480, 90);
        assert_eq!(boxed.frame, Some((640, 480, 90)));
    }
}
