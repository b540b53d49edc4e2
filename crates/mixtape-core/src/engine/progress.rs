#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    TaskStart { total_steps: u64 },
    TaskIncrement,
    TaskFinish,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    /// Brackets `steps` calls of `body` with task start/increment/finish events.
    pub fn task<T, E>(
        &self,
        steps: usize,
        mut body: impl FnMut(usize) -> Result<T, E>,
    ) -> Result<Vec<T>, E> {
        self.report(Progress::TaskStart {
            total_steps: steps as u64,
        });
        let mut results = Vec::with_capacity(steps);
        for step in 0..steps {
            results.push(body(step)?);
            self.report(Progress::TaskIncrement);
        }
        self.report(Progress::TaskFinish);
        Ok(results)
    }
}
