use std::ops::Deref;
use std::sync::Arc;

use capacity_kubescaler::Engine;

pub struct AppInner {
    pub engine: Arc<Engine>,
}

#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl Deref for App {
    type Target = AppInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl App {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            inner: Arc::new(AppInner { engine }),
        }
    }
}
