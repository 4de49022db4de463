use thermodiff::{DisplaySink, ProcessedSample, TimeWindow};

/// Line-per-sample console view over a [`TimeWindow`].
pub struct ConsoleDisplay {
    window: TimeWindow,
    quiet: bool,
    last_percent: Option<u32>,
}

impl ConsoleDisplay {
    pub fn new(window_secs: f64, quiet: bool) -> Self {
        Self {
            window: TimeWindow::new(window_secs),
            quiet,
            last_percent: None,
        }
    }

    pub fn window(&self) -> &TimeWindow {
        &self.window
    }
}

pub fn format_sample(sample: &ProcessedSample, range: Option<(f64, f64)>) -> String {
    let filtered = sample
        .filtered
        .iter()
        .map(|v| format!("{:.3}", v))
        .collect::<Vec<_>>()
        .join(" ");

    let mut line = format!(
        "{:>9.3} s  diff {:+.3}  [{}]",
        sample.elapsed_secs, sample.difference, filtered
    );
    if let Some((lo, hi)) = range {
        line.push_str(&format!("  window {:+.3}..{:+.3}", lo, hi));
    }
    line
}

impl DisplaySink for ConsoleDisplay {
    fn clear(&mut self) {
        self.window.clear();
        self.last_percent = None;
        if !self.quiet {
            println!("--- new measurement ---");
        }
    }

    fn show_progress(&mut self, percent: f64) {
        self.window.show_progress(percent);

        let whole = percent.floor() as u32;
        if self.last_percent == Some(whole) {
            return;
        }
        self.last_percent = Some(whole);
        if !self.quiet {
            println!("filling filter buffer: {:>3}%", whole);
        }
    }

    fn show_sample(&mut self, sample: &ProcessedSample) {
        self.window.show_sample(sample);
        if !self.quiet {
            println!("{}", format_sample(sample, self.window.difference_range()));
        }
    }
}
