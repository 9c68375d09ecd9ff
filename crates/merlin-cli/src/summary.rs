use console::Style;
use merlin_core::pipeline::config::ProcessingConfig;
use merlin_core::pipeline::{RunKind, RunSummary};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

/// Print the settings a run is about to use.
pub fn print_run_summary(config: &ProcessingConfig, kind: RunKind) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to(format!("merlinio {kind}")));
    println!(
        "  {}",
        s.title.apply_to("\u{2550}".repeat(9 + kind.to_string().len()))
    );
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(config.input.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Index"),
        s.value.apply_to(config.index)
    );
    if config.swap_bytes {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Byte order"),
            s.value.apply_to("swapped")
        );
    }
    match config.scan_roi {
        Some(roi) => println!(
            "  {:<14}{}",
            s.label.apply_to("Scan ROI"),
            s.value
                .apply_to(format!("({}, {}) - ({}, {})", roi.x0, roi.y0, roi.x1, roi.y1))
        ),
        None => println!(
            "  {:<14}{}",
            s.label.apply_to("Scan ROI"),
            s.disabled.apply_to("full scan")
        ),
    }
    println!();

    if matches!(kind, RunKind::Integrate | RunKind::CenterOfMass) {
        let c = &config.calibration;
        println!("  {}", s.header.apply_to("Detector"));
        println!(
            "    {:<12}{}",
            s.label.apply_to("Origin"),
            s.value.apply_to(format!("({}, {})", c.offset.x, c.offset.y))
        );
        println!(
            "    {:<12}{}",
            s.label.apply_to("a0"),
            s.value.apply_to(format!("({}, {})", c.a0.x, c.a0.y))
        );
        println!(
            "    {:<12}{}",
            s.label.apply_to("a1"),
            s.value.apply_to(format!("({}, {})", c.a1.x, c.a1.y))
        );
        let range = config.annular_range;
        if range.is_enabled() {
            println!(
                "    {:<12}{}",
                s.label.apply_to("Range"),
                s.value.apply_to(format!("[{}, {})", range.min, range.max))
            );
        } else {
            println!(
                "    {:<12}{}",
                s.label.apply_to("Range"),
                s.disabled.apply_to("disabled")
            );
        }
        println!();
    }

    let corrections = &config.corrections;
    println!("  {}", s.header.apply_to("Corrections"));
    let optional = [
        ("Defect mask", corrections.defect_mask.as_ref()),
        ("Defect list", corrections.defect_list.as_ref()),
        ("Gain", corrections.gain_correction.as_ref()),
    ];
    for (label, path) in optional {
        match path {
            Some(path) => println!(
                "    {:<12}{}",
                s.label.apply_to(label),
                s.path.apply_to(path.display())
            ),
            None => println!(
                "    {:<12}{}",
                s.label.apply_to(label),
                s.disabled.apply_to("none")
            ),
        }
    }
    if !corrections.defect_pixels.is_empty() {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Defects"),
            s.value.apply_to(corrections.defect_pixels.len())
        );
    }
    println!();
}

/// Print what a finished run wrote.
pub fn print_result(summary: &RunSummary) {
    let s = Styles::new();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Frames"),
        s.value.apply_to(summary.frames)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Scan ROI"),
        s.value
            .apply_to(format!("{} x {}", summary.roi.columns(), summary.roi.rows()))
    );
    if summary.outputs.is_empty() {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Output"),
            s.disabled.apply_to("nothing to write")
        );
    }
    for path in &summary.outputs {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Written"),
            s.path.apply_to(path.display())
        );
    }
}
