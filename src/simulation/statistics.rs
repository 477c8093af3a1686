use std::time::{Duration, Instant};

use ahash::HashMap;

use crate::{floating_type_mod::FT, Fluid};

#[derive(Clone, Debug)]
pub struct Counter<T> {
    values: Vec<T>,
    last_start: Instant,
}

impl<T> Counter<T> {
    fn new() -> Self {
        Counter::<T> {
            last_start: Instant::now(),
            values: Vec::new(),
        }
    }

    fn add_value(&mut self, v: T) {
        self.values.push(v);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Counter<FT> {
    pub fn avg(&self) -> FT {
        if self.values.is_empty() {
            return 0.;
        }
        self.values.iter().cloned().sum::<FT>() / self.values.len() as FT
    }

    pub fn min(&self) -> FT {
        self.values.iter().cloned().fold(FT::MAX, FT::min)
    }

    pub fn max(&self) -> FT {
        self.values.iter().cloned().fold(FT::MIN, FT::max)
    }
}

impl Counter<Duration> {
    fn begin(&mut self) {
        self.last_start = Instant::now();
    }

    fn end(&mut self) {
        self.values.push(Instant::now() - self.last_start);
    }

    fn end_add_to_last(&mut self) {
        let duration = Instant::now() - self.last_start;
        match self.values.last_mut() {
            Some(last) => *last += duration,
            None => self.values.push(duration),
        }
    }

    pub fn avg(&self) -> Duration {
        if self.values.is_empty() {
            return Duration::ZERO;
        }
        self.sum() / self.values.len() as u32
    }

    pub fn sum(&self) -> Duration {
        self.values.iter().cloned().sum::<Duration>()
    }
}

/// Named scalar samples, e.g. the density error of every step.
#[derive(Clone, Debug)]
pub struct ValueCounters {
    counters: HashMap<String, Counter<FT>>,
    enabled: bool,
}

impl ValueCounters {
    pub fn new(enabled: bool) -> ValueCounters {
        ValueCounters {
            counters: HashMap::default(),
            enabled,
        }
    }

    pub fn add_value(&mut self, id: &str, v: FT) {
        if self.enabled {
            self.counters
                .entry(id.to_string())
                .or_insert_with(Counter::<FT>::new)
                .add_value(v);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Counter<FT>> {
        self.counters.get(id)
    }

    pub fn clear(&mut self) {
        self.counters.clear();
    }

    fn sorted(&self) -> Vec<(&String, &Counter<FT>)> {
        let mut v = self.counters.iter().collect::<Vec<_>>();
        v.sort_by(|x, y| x.0.cmp(y.0));
        v
    }
}

/// Named wall clock timers. `begin`/`end` pairs must not be nested for the same id.
#[derive(Clone, Debug)]
pub struct PerformanceCounters {
    counters: HashMap<String, Counter<Duration>>,
    enabled: bool,
}

impl PerformanceCounters {
    pub fn new(enabled: bool) -> PerformanceCounters {
        PerformanceCounters {
            counters: HashMap::default(),
            enabled,
        }
    }

    pub fn begin(&mut self, id: &str) {
        if self.enabled {
            self.counters
                .entry(id.to_string())
                .or_insert_with(Counter::<Duration>::new)
                .begin();
        }
    }

    pub fn end(&mut self, id: &str) {
        if self.enabled {
            if let Some(counter) = self.counters.get_mut(id) {
                counter.end();
            }
        }
    }

    /// Count this measurement as part of the last one, for phases that are interrupted by others.
    pub fn end_add_to_last(&mut self, id: &str) {
        if self.enabled {
            if let Some(counter) = self.counters.get_mut(id) {
                counter.end_add_to_last();
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Counter<Duration>> {
        self.counters.get(id)
    }

    pub fn clear(&mut self) {
        self.counters.clear();
    }

    fn sorted(&self) -> Vec<(&String, &Counter<Duration>)> {
        let mut v = self.counters.iter().collect::<Vec<_>>();
        v.sort_by(|x, y| x.0.cmp(y.0));
        v
    }
}

pub fn write_statistics(fluid: &Fluid) -> String {
    let mut s = String::new();

    let simulation_time = fluid
        .performance_counters()
        .get("simulation-step")
        .map(|c| c.sum())
        .unwrap_or_default();
    let steps = fluid.performance_counters().get("simulation-step").map_or(0, |c| c.len());

    s += &format!("simulation-time: {}ms\n", simulation_time.as_secs_f64() * 1000.);
    s += &format!("steps: {}\n", steps);
    s += "\n";

    for (label, pcounter) in fluid.performance_counters().sorted() {
        s += &format!(
            "{}: avg:{}ms sum:{}ms\n",
            label,
            pcounter.avg().as_secs_f64() * 1000.,
            pcounter.sum().as_secs_f64() * 1000.
        );
    }
    s += "\n";

    for (label, vcounter) in fluid.value_counters().sorted() {
        s += &format!(
            "{}: min:{} max:{} avg:{}\n",
            label,
            vcounter.min(),
            vcounter.max(),
            vcounter.avg()
        );
    }

    s
}
