use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use merlin_core::io::index::IndexMode;
use merlin_core::pipeline::Session;

#[derive(Args)]
pub struct InfoArgs {
    /// Data set base path (`<base>.hdr`, `<base>1.mib`, ...)
    pub file: PathBuf,

    /// Read and verify every frame header while indexing
    #[arg(long)]
    pub scan_frame_headers: bool,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let mut session = Session::new();
    if args.scan_frame_headers {
        session.set_index_mode(IndexMode::Scan);
    }
    session
        .load_header(&args.file)
        .with_context(|| format!("Failed to read header of {}", args.file.display()))?;
    session
        .build_frame_index()
        .with_context(|| format!("Failed to index data files of {}", args.file.display()))?;

    let header = session.header();
    let template = session.template()?;
    let grid = session.scan_grid();

    println!("Data set:     {}", args.file.display());
    println!("Timestamp:    {}", header.timestamp.trim());
    println!("Frames:       {}", header.n_frames);
    println!("Scan grid:    {}x{}", grid.columns, grid.rows);
    println!("Data files:   {}", header.n_files);
    println!("Frame size:   {}x{}", template.columns, template.rows);
    println!("Bit depth:    {}", template.bits_per_pixel);
    println!("Header bytes: {}", header.frame_header_bytes);
    println!("Data bytes:   {}", header.frame_data_bytes);
    println!("Dwell time:   {} s", template.dwell_time);
    println!("Chips:        {}", template.chips);
    println!("Layout:       {}", template.sensor_layout);

    let total_mb = (header.frame_stride() * header.n_frames as u64) as f64 / (1024.0 * 1024.0);
    println!("Data size:    {:.1} MB", total_mb);

    Ok(())
}
