use super::{Params, Value};
use crate::Result;
use std::any::Any;
use std::sync::Arc;

/// Anything a call expression can invoke.
pub trait Callable: Send + Sync {
    fn name(&self) -> &str;
    fn call(&self, params: Params) -> Result<Value>;
    fn as_any(&self) -> &dyn Any;
}

pub type CallableRef = Arc<dyn Callable>;
