use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright, bright_green, bright_red, bright_yellow};

/// Progress tracking for the three phases of a calculation pass
pub struct PhaseProgress {
    pb: ProgressBar,
}

impl PhaseProgress {
    pub fn start_phase_1(days: i64) -> Self {
        eprintln!("{}  {}", bright("⚙️"), bright("Phases").underlined());
        let pb = create_spinner(
            bright_yellow(format!("Phase 1/3: Fetching workflow runs (last {days} days)"))
                .to_string(),
        );
        Self { pb }
    }

    pub fn finish_phase_1_start_phase_2(self, run_count: usize) -> Self {
        self.pb.finish_with_message(
            bright_green(format!("Phase 1/3: Fetched {run_count} workflow runs ✓")).to_string(),
        );
        let pb = create_spinner(
            bright_yellow(format!("Phase 2/3: Pricing {run_count} runs")).to_string(),
        );
        Self { pb }
    }

    pub fn finish_phase_2_start_phase_3(self, analyzed: usize, total: usize) -> Self {
        self.pb.finish_with_message(
            bright_green(format!("Phase 2/3: Priced {analyzed}/{total} runs ✓")).to_string(),
        );
        let pb = create_spinner(bright_yellow("Phase 3/3: Saving results").to_string());
        Self { pb }
    }

    pub fn finish_phase_3(self) {
        self.pb
            .finish_with_message(bright_green("Phase 3/3: Results saved ✓").to_string());
        eprintln!("\n");
    }

    /// Stops the current phase after an error.
    pub fn abandon(self, reason: &str) {
        self.pb
            .abandon_with_message(bright_red(format!("Calculation failed: {reason} ✗")).to_string());
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
