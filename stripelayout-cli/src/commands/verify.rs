//! Verify Command
//!
//! Writes generated content through the striped layout into an in-memory
//! block store, reads every block back and checks each byte against the
//! oracle.

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use stripelayout_core::{
    split_block_group, ByteOracle, GroupBuffers, Mismatch, StripeVerifier, StripingConfig,
};
use stripelayout_storage::{fetch_group, AsyncWrapper, MemoryBlockStore};
use tracing::{info, warn};

const FILE_PATH: &str = "/verify";

/// Mismatches printed before the rest are summarised
const MAX_REPORTED: usize = 20;

/// Verify configuration
pub struct VerifyConfig {
    pub write_bytes: u64,
    pub all_mismatches: bool,
    pub corrupt: Vec<u64>,
}

/// Run verify command
pub async fn run(striping: StripingConfig, oracle: ByteOracle, config: VerifyConfig) -> Result<()> {
    let store = AsyncWrapper(MemoryBlockStore::new(striping));
    let content = oracle.generate(config.write_bytes as usize);
    store.0.write_file(FILE_PATH, &content)?;
    drop(content);

    let groups = store.0.located_block_groups(FILE_PATH)?;

    for &offset in &config.corrupt {
        anyhow::ensure!(
            offset < config.write_bytes,
            "corrupt offset {} is past end of file ({} bytes)",
            offset,
            config.write_bytes
        );
        let loc = striping.locate(offset);
        let block_id = groups[loc.group as usize].block.block_id + loc.block as u64;
        store
            .0
            .corrupt_byte(block_id, loc.offset_in_block as usize, 0)
            .with_context(|| format!("Failed to corrupt offset {}", offset))?;
        warn!(offset, group = loc.group, block = loc.block, "Injected corruption");
    }

    let file_len = store.0.file_length(FILE_PATH)?;
    let verifier = StripeVerifier::new(striping, oracle);

    let pb = ProgressBar::new(groups.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} groups")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let mut fetched: Vec<GroupBuffers> = Vec::with_capacity(groups.len());
    for (index, group) in groups.iter().enumerate() {
        let blocks = split_block_group(group, &striping)?;
        let buffers = fetch_group(&store, &striping, index as u64, &blocks)
            .await
            .with_context(|| format!("Failed to fetch block group {}", index))?;
        fetched.push(buffers);
        pb.inc(1);
    }
    pb.finish_and_clear();

    if config.all_mismatches {
        anyhow::ensure!(
            file_len == config.write_bytes,
            "File length error: expect={}, actual={}",
            config.write_bytes,
            file_len
        );
        let mismatches = verifier.file_mismatches(config.write_bytes, &fetched)?;
        return report_all(&mismatches, config.write_bytes);
    }

    match verifier.verify_file(file_len, config.write_bytes, &fetched) {
        Ok(report) => {
            info!(
                groups = report.groups,
                blocks = report.blocks,
                bytes = report.bytes,
                "Verification passed"
            );
            println!(
                "{} Verified {} bytes in {} blocks across {} block groups",
                style("✓").green(),
                style(report.bytes).cyan(),
                style(report.blocks).cyan(),
                style(report.groups).cyan()
            );
            Ok(())
        }
        Err(e) => {
            println!("{} {}", style("✗").red(), e);
            Err(e.into())
        }
    }
}

fn report_all(mismatches: &[Mismatch], write_bytes: u64) -> Result<()> {
    if mismatches.is_empty() {
        println!(
            "{} All {} bytes match",
            style("✓").green(),
            style(write_bytes).cyan()
        );
        return Ok(());
    }

    println!(
        "{} {} mismatched bytes",
        style("✗").red(),
        style(mismatches.len()).red().bold()
    );
    for m in mismatches.iter().take(MAX_REPORTED) {
        println!("  {}", m);
    }
    if mismatches.len() > MAX_REPORTED {
        println!(
            "  {}",
            style(format!("... and {} more", mismatches.len() - MAX_REPORTED)).dim()
        );
    }
    anyhow::bail!("{} bytes failed verification", mismatches.len())
}
