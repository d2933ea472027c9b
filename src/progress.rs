pub struct ProgressStyle(indicatif::ProgressStyle);

impl Default for ProgressStyle {
    fn default() -> Self {
        let style = indicatif::ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {msg} [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
        )
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar());
        let style = style.with_key(
            "eta",
            |state: &indicatif::ProgressState, w: &mut dyn std::fmt::Write| {
                let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
            },
        );
        let style = style.progress_chars("#-");
        Self(style)
    }
}

impl From<ProgressStyle> for indicatif::ProgressStyle {
    fn from(val: ProgressStyle) -> Self {
        val.0
    }
}

/// An empty progress bar, its length grows with every submitted simulation.
#[must_use]
pub fn bar(hidden: bool) -> indicatif::ProgressBar {
    if hidden {
        return indicatif::ProgressBar::hidden();
    }
    let bar = indicatif::ProgressBar::new(0);
    bar.set_style(ProgressStyle::default().into());
    bar.enable_steady_tick(std::time::Duration::from_secs_f64(1.0 / 10.0));
    bar
}
