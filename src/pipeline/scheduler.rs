//! 检测调度 (Detection Scheduler)
//!
//! 单飞行(single-flight): 任意时刻最多一个检测任务在后台执行.
//! 忙碌时新任务直接丢弃, 不排队不重试, 采集线程永远不会被阻塞.
//!
//! ```text
//!   Idle --submit--> Busy --completion--> Idle
//!   Busy --submit--> Busy (rejected)
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tracing::{debug, error, info, warn};

use crate::error::{PipelineError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// 后台执行器: 固定数量的工作线程消费任务队列
pub struct BackgroundExecutor {
    name: String,
    tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl BackgroundExecutor {
    pub fn new(name: &str, threads: usize) -> std::io::Result<Self> {
        let (tx, rx) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(threads.max(1));

        for i in 0..threads.max(1) {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("{name}-{i}"))
                .spawn(move || {
                    for job in rx.iter() {
                        // 任务panic不能带走工作线程
                        if catch_unwind(AssertUnwindSafe(job)).is_err() {
                            error!("❌ 后台任务 panic");
                        }
                    }
                })?;
            workers.push(handle);
        }

        info!("✅ 后台执行器 {} 启动 ({} 线程)", name, workers.len());
        Ok(Self {
            name: name.to_string(),
            tx: Some(tx),
            workers,
        })
    }

    /// 投递任务, 不等待执行
    pub fn execute<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let tx = self.tx.as_ref().ok_or(PipelineError::ExecutorClosed)?;
        tx.send(Box::new(job))
            .map_err(|_| PipelineError::ExecutorClosed)
    }
}

impl Drop for BackgroundExecutor {
    fn drop(&mut self) {
        // 关闭队列, 已投递的任务执行完后线程退出
        self.tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        debug!("后台执行器 {} 已退出", self.name);
    }
}

/// 调度器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Busy,
}

/// 提交结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Accepted,
    Rejected,
}

/// 任务结束时清除 "检测中" 标志并发出空闲信号 (正常返回/出错/panic 均会执行)
struct InFlightGuard {
    in_flight: Arc<AtomicBool>,
    idle_tx: Sender<()>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
        // 容量为1, 多次完成合并为一个信号
        let _ = self.idle_tx.try_send(());
    }
}

pub struct DetectionScheduler {
    in_flight: Arc<AtomicBool>,
    executor: Arc<BackgroundExecutor>,
    idle_tx: Sender<()>,
    idle_rx: Receiver<()>,
}

impl DetectionScheduler {
    pub fn new(executor: Arc<BackgroundExecutor>) -> Self {
        let (idle_tx, idle_rx) = bounded(1);
        Self {
            in_flight: Arc::new(AtomicBool::new(false)),
            executor,
            idle_tx,
            idle_rx,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn state(&self) -> SchedulerState {
        if self.is_busy() {
            SchedulerState::Busy
        } else {
            SchedulerState::Idle
        }
    }

    /// 尝试提交检测任务
    ///
    /// 忙碌时立即返回 `Rejected`; 否则置位标志并投递到后台执行器.
    /// 任务返回的错误只记录日志, 不重试.
    pub fn try_submit<F>(&self, task: F) -> Submission
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Submission::Rejected;
        }

        let guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
            idle_tx: self.idle_tx.clone(),
        };
        let job = move || {
            let _guard = guard;
            if let Err(e) = task() {
                warn!("⚠️ 检测任务失败: {:#}", e);
            }
        };

        // 投递失败时 job 被丢弃, guard 随之清除标志
        match self.executor.execute(job) {
            Ok(()) => Submission::Accepted,
            Err(e) => {
                warn!("⚠️ 无法提交检测任务: {}", e);
                Submission::Rejected
            }
        }
    }

    /// 等待当前任务完成 (用于会话结束时排空)
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        // 信号可能来自更早完成的任务, 收到后重新检查标志
        while self.is_busy() {
            if self.idle_rx.recv_deadline(deadline).is_err() {
                return !self.is_busy();
            }
        }
        true
    }
}
