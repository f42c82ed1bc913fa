//! Query heap descriptor and handle.

use std::any::Any;
use std::sync::Arc;

use crate::flags::QueryKind;

#[derive(Debug, Clone, Default)]
pub struct QueryHeapDesc {
    pub label: Option<String>,
    pub kind: QueryKind,
    pub count: u32,
}

pub trait QueryHeapApi: Send + Sync {
    fn desc(&self) -> &QueryHeapDesc;
    fn set_label(&self, label: &str);
    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone)]
pub struct QueryHeap {
    api: Arc<dyn QueryHeapApi>,
}

impl QueryHeap {
    pub fn from_api(api: Arc<dyn QueryHeapApi>) -> Self {
        Self { api }
    }

    #[inline]
    pub fn desc(&self) -> &QueryHeapDesc {
        self.api.desc()
    }

    #[inline]
    pub fn kind(&self) -> QueryKind {
        self.api.desc().kind
    }

    pub fn set_label(&self, label: &str) {
        self.api.set_label(label);
    }

    #[inline]
    pub fn api(&self) -> &dyn QueryHeapApi {
        self.api.as_ref()
    }
}
