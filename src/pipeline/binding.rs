//! 视图绑定校验。
//!
//! 每个页面视图持有一个单调递增的绑定代数。发起请求时取一张 `BindingTicket`，
//! 视图被回收或重新绑定后代数变化，旧票据随之失效：
//! 失效票据对应的解码在开始前被放弃，完成后的结果也不会投递。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 视图侧的绑定状态。
#[derive(Debug, Clone, Default)]
pub struct ViewBinding {
    generation: Arc<AtomicU64>,
}

impl ViewBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开始一次新绑定，之前签发的票据全部失效。
    pub fn bind(&self) -> BindingTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        BindingTicket {
            generation: Arc::clone(&self.generation),
            expected: generation,
        }
    }

    /// 解除绑定（视图回收 / 销毁）。
    pub fn unbind(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// 请求时签发的绑定票据。
#[derive(Debug, Clone)]
pub struct BindingTicket {
    generation: Arc<AtomicU64>,
    expected: u64,
}

impl BindingTicket {
    /// 不与任何视图关联、永远有效的票据（预取、命令行等场景）。
    pub fn detached() -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            expected: 0,
        }
    }

    /// 视图仍绑定在发起请求时的目标上。
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.expected
    }
}
