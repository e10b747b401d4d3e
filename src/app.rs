use std::ops::Deref;
use std::sync::Arc;

use crate::counter::CounterService;
use crate::sync::SyncSchedule;

pub struct AppData<C, S>(Arc<RuntimeData<C, S>>);

impl<C, S> From<RuntimeData<C, S>> for AppData<C, S> {
    fn from(data: RuntimeData<C, S>) -> Self {
        Self(Arc::new(data))
    }
}

impl<C, S> Clone for AppData<C, S> {
    fn clone(&self) -> Self {
        AppData(Arc::clone(&self.0))
    }
}

impl<C, S> Deref for AppData<C, S> {
    type Target = Arc<RuntimeData<C, S>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(typed_builder::TypedBuilder)]
pub struct RuntimeData<C, S> {
    pub counter: CounterService<C, S>,
    #[builder(default)]
    pub sync: SyncSchedule,
}
