use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use t2map_core::consts::DEFAULT_FRAME_CAP;
use t2map_core::io::dicom::{tags, DicomFile};
use t2map_core::io::loader::{decode_frame, list_dicom_files};

#[derive(Args)]
pub struct InfoArgs {
    /// Folder holding one echo per .dcm file
    pub dir: PathBuf,

    /// Maximum number of echoes considered, in file-name order
    #[arg(long, default_value_t = DEFAULT_FRAME_CAP)]
    pub frame_cap: usize,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let files = list_dicom_files(&args.dir)
        .with_context(|| format!("Failed to list {}", args.dir.display()))?;

    println!("Folder:      {}", args.dir.display());
    println!("DICOM files: {}", files.len());
    if files.len() > args.frame_cap {
        println!(
            "Used:        first {} (frame cap), {} ignored",
            args.frame_cap,
            files.len() - args.frame_cap
        );
    }
    println!();

    let mut echo_times = Vec::new();
    for (index, path) in files.iter().take(args.frame_cap).enumerate() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = DicomFile::open(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let te = file.dataset.f64(tags::ECHO_TIME);
        let te_text = te
            .map(|t| format!("{:.2} ms", t))
            .unwrap_or_else(|| "missing".into());

        match decode_frame(&file, index) {
            Ok(frame) => println!(
                "  {:<28} TE {:<12} {}x{}  {}",
                name,
                te_text,
                frame.cols(),
                frame.rows(),
                file.transfer_syntax.uid()
            ),
            Err(e) => println!("  {:<28} TE {:<12} unreadable: {}", name, te_text, e),
        }
        if let Some(t) = te {
            echo_times.push(t);
        }
    }

    echo_times.sort_by(|a, b| a.total_cmp(b));
    println!();
    println!("Echo times:  {:?}", echo_times);

    Ok(())
}
