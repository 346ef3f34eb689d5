use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, Level};
use std::path::{Path, PathBuf};
use trans_filter::{output, pipeline, positions::PositionResolver, table_reader, types::FilterConfig};

#[derive(Parser)]
#[command(name = "trans-filter")]
#[command(version)]
#[command(
    about = "Filter trans-eQTL associations and separate genuine trans signals from cis leakage",
    long_about = None
)]
struct Args {
    /// Input trans-eQTL table (tab-separated, with header)
    #[arg(short, long)]
    input: PathBuf,

    /// Output table path
    #[arg(short, long)]
    output: PathBuf,

    /// Gene coordinate table (chrom, start, end, gene_id; no header).
    /// Enables distance-based true-trans classification.
    #[arg(short, long)]
    gene_bed: Option<PathBuf>,

    /// Summary report path (defaults to <output stem>_stats.txt)
    #[arg(long)]
    stats: Option<PathBuf>,

    /// FDR q-value threshold
    #[arg(long, default_value = "0.05")]
    qval_threshold: f64,

    /// Raw p-value threshold
    #[arg(long, default_value = "1e-8")]
    pval_threshold: f64,

    /// Minimum absolute effect size |slope|
    #[arg(long, default_value = "0.1")]
    effect_size_threshold: f64,

    /// Minimum minor allele frequency (applied when the input has a maf column)
    #[arg(long, default_value = "0.05")]
    min_maf: f64,

    /// Number of distinct genes per SNP at which the SNP counts as a hotspot
    #[arg(long, default_value = "3")]
    gene_count_threshold: usize,

    /// Maximum SNPs per gene to keep (top by p-value)
    #[arg(long, default_value = "5")]
    snps_per_gene: usize,

    /// Minimum distance in bp for a same-chromosome trans-eQTL
    #[arg(long, default_value = "5000000")]
    distance_threshold: u64,

    /// Filter out trans-eQTL hotspots
    #[arg(long)]
    filter_hotspots: bool,

    /// Filter out cis-acting trans-eQTLs (implied by --gene-bed)
    #[arg(long)]
    filter_cis_acting: bool,

    /// Number of threads for parallel processing
    #[arg(long, default_value_t = num_cpus())]
    threads: usize,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            qval_threshold: self.qval_threshold,
            pval_threshold: self.pval_threshold,
            effect_size_threshold: self.effect_size_threshold,
            min_maf: self.min_maf,
            gene_count_threshold: self.gene_count_threshold,
            snps_per_gene: self.snps_per_gene,
            distance_threshold: self.distance_threshold,
            filter_hotspots: self.filter_hotspots,
            filter_cis_acting: self.filter_cis_acting || self.gene_bed.is_some(),
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

macro_rules! progress {
    ($quiet:expr) => {
        if !$quiet {
            eprintln!();
        }
    };
    ($quiet:expr, $($arg:tt)*) => {
        if !$quiet {
            eprintln!($($arg)*);
        }
    };
}

fn make_progress_bar(quiet: bool, len: u64) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("  [{elapsed_precise}/{eta_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.quiet { Level::Warn } else { Level::Info };
    simple_logger::init_with_level(level).context("Failed to initialise logger")?;

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()
        .context("Failed to configure thread pool")?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let config = args.filter_config();
    let stats_path = args
        .stats
        .clone()
        .unwrap_or_else(|| output::default_stats_path(&args.output));

    print_banner(&args, &config, &stats_path);

    let resolver = match args.gene_bed {
        Some(ref path) => Some(PositionResolver::load_gene_table(path)?),
        None => None,
    };

    let table = table_reader::load_association_table(&args.input)?;

    let pb = match resolver {
        Some(_) => make_progress_bar(args.quiet, 0)?,
        None => ProgressBar::hidden(),
    };
    pb.set_message("associations placed");
    let result = pipeline::run(&table, &config, resolver.as_ref(), Some(&pb))?;
    pb.finish_and_clear();

    result.write(&table.columns, &args.input, &args.output, &stats_path)?;
    info!("Trans-eQTLs saved to: {}", args.output.display());
    info!("Summary saved to: {}", stats_path.display());

    progress!(args.quiet);
    progress!(args.quiet, "Done! {} associations written to: {}", result.len(), args.output.display());

    Ok(())
}

fn print_banner(args: &Args, config: &FilterConfig, stats_path: &Path) {
    progress!(args.quiet, "Trans-eQTL Filter");
    progress!(args.quiet, "=========================================");
    progress!(args.quiet, "Input table: {}", args.input.display());
    progress!(args.quiet, "Output table: {}", args.output.display());
    progress!(args.quiet, "Summary: {}", stats_path.display());
    if let Some(ref bed) = args.gene_bed {
        progress!(args.quiet, "Gene coordinates: {}", bed.display());
    }
    progress!(args.quiet, "q-value < {}", config.qval_threshold);
    progress!(args.quiet, "p-value < {}", config.pval_threshold);
    progress!(args.quiet, "|slope| > {}", config.effect_size_threshold);
    progress!(args.quiet, "MAF >= {}", config.min_maf);
    progress!(args.quiet, "SNPs per gene: {}", config.snps_per_gene);
    if config.filter_hotspots {
        progress!(args.quiet, "Hotspot filter: enabled (>= {} genes per SNP)", config.gene_count_threshold);
    } else {
        progress!(args.quiet, "Hotspot filter: disabled");
    }
    if config.filter_cis_acting {
        progress!(args.quiet, "Cis-acting filter: enabled");
        if args.gene_bed.is_some() {
            progress!(args.quiet, "  Same-chromosome distance > {} bp", config.distance_threshold);
        }
    } else {
        progress!(args.quiet, "Cis-acting filter: disabled");
    }
    progress!(args.quiet, "Threads: {}", args.threads);
    progress!(args.quiet);
}
