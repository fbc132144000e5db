use std::path::Path;

use crate::foundation::cancel::CancelToken;
use crate::foundation::error::SceneResult;
use crate::mix::plan::MixPlan;

/// Turns a compiled [`MixPlan`] into an encoded audio file at `out_path`.
///
/// Implementations must either produce a complete file or leave `out_path` untouched.
pub trait RenderEngine: Send + Sync {
    fn render(&self, plan: &MixPlan, out_path: &Path, cancel: &CancelToken) -> SceneResult<()>;
}
