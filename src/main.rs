// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use member_registry::{
    export_csv, insert_events, load_records, load_snapshot, open_audit_log, save_snapshot,
    Event, Member, RawRecord, Reconciler, RegistryConfig, SourceType,
};

const USAGE: &str = "\
Usage:
  member-registry merge --snapshot <out.json> [--resume] [--config <cfg.json>]
                        [--audit <audit.db>] [--csv <out.csv>] [--source <id>] <inputs...>
  member-registry match [--config <cfg.json>] <snapshot.json> <name> [constituency]
  member-registry stats [--config <cfg.json>] <snapshot.json>
  member-registry ui <snapshot.json>";

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("merge") => run_merge(&args[2..])?,
        Some("match") => run_match(&args[2..])?,
        Some("stats") => run_stats(&args[2..])?,
        Some("ui") => run_ui_mode(&args[2..])?,
        Some("help") | Some("--help") | Some("-h") => println!("{}", USAGE),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}

// ============================================================================
// MERGE
// ============================================================================

#[derive(Debug, Default, PartialEq)]
struct MergeArgs {
    snapshot: PathBuf,
    resume: bool,
    config: Option<PathBuf>,
    audit: Option<PathBuf>,
    csv: Option<PathBuf>,
    source: Option<SourceType>,
    inputs: Vec<PathBuf>,
}

fn parse_merge_args(args: &[String]) -> Result<MergeArgs> {
    let mut parsed = MergeArgs::default();
    let mut snapshot = None;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .with_context(|| format!("{} needs a value", flag))
        };

        match arg.as_str() {
            "--snapshot" => snapshot = Some(PathBuf::from(value("--snapshot")?)),
            "--config" => parsed.config = Some(PathBuf::from(value("--config")?)),
            "--audit" => parsed.audit = Some(PathBuf::from(value("--audit")?)),
            "--csv" => parsed.csv = Some(PathBuf::from(value("--csv")?)),
            "--source" => parsed.source = Some(SourceType::parse(&value("--source")?)),
            "--resume" => parsed.resume = true,
            flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
            input => parsed.inputs.push(PathBuf::from(input)),
        }
    }

    parsed.snapshot = snapshot.context("--snapshot <out.json> is required")?;
    if parsed.inputs.is_empty() {
        bail!("No input files given");
    }
    Ok(parsed)
}

/// `--source` wins; otherwise the file name says where the records came from
fn source_for(path: &Path, explicit: Option<&SourceType>) -> SourceType {
    if let Some(source) = explicit {
        return source.clone();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    SourceType::parse(&stem)
}

fn run_merge(args: &[String]) -> Result<()> {
    let args = parse_merge_args(args)?;

    println!("🔗 Member Registry - Merge");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Config
    let config = load_config(args.config.as_deref())?;

    // 2. Checkpoint
    let members: Vec<Member> = if args.resume && args.snapshot.exists() {
        let snapshot = load_snapshot(&args.snapshot)?;
        println!("\n📂 Resuming from {:?} ({} members, saved {})",
            args.snapshot, snapshot.members.len(), snapshot.saved_at);
        snapshot.members
    } else {
        Vec::new()
    };
    let mut reconciler = Reconciler::resume(config, members)?;

    // 3. Records
    println!("\n📥 Loading records...");
    let mut records: Vec<RawRecord> = Vec::new();
    for input in &args.inputs {
        let source = source_for(input, args.source.as_ref());
        let loaded = load_records(input, &source)?;
        println!("✓ {} records from {:?} (default source: {})", loaded.len(), input, source);
        records.extend(loaded);
    }

    // 4. Reconcile
    println!("\n🔄 Matching and merging {} records...", records.len());
    reconciler.ingest_all(records);
    println!("✓ Store now holds {} members", reconciler.store().len());

    // 5. Audit log
    let journal = reconciler.take_journal();
    if let Some(audit_path) = &args.audit {
        let mut conn = open_audit_log(audit_path)?;
        let events: Vec<Event> = journal.iter().map(Event::from_decision).collect();
        let inserted = insert_events(&mut conn, &events)?;
        println!("\n📜 Wrote {} audit events to {:?}", inserted, audit_path);
    }

    // 6. Outputs
    save_snapshot(&args.snapshot, reconciler.store())?;
    println!("\n💾 Snapshot saved to {:?}", args.snapshot);

    if let Some(csv_path) = &args.csv {
        let written = export_csv(csv_path, reconciler.store().members())?;
        println!("📄 Exported {} members to {:?}", written, csv_path);
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for line in reconciler.stats().summary().lines() {
        println!("✓ {}", line);
    }

    Ok(())
}

// ============================================================================
// MATCH / STATS
// ============================================================================

fn load_config(path: Option<&Path>) -> Result<RegistryConfig> {
    match path {
        Some(path) => {
            println!("⚙️  Loading config from {:?}", path);
            RegistryConfig::from_file(path)
        }
        None => Ok(RegistryConfig::default()),
    }
}

/// Pull `--config <file>` out of a subcommand's arguments
fn split_config_flag(args: &[String]) -> Result<(Option<PathBuf>, Vec<String>)> {
    let mut config = None;
    let mut rest = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let value = iter.next().context("--config needs a value")?;
            config = Some(PathBuf::from(value));
        } else {
            rest.push(arg.clone());
        }
    }

    Ok((config, rest))
}

fn snapshot_arg(args: &[String]) -> Result<&Path> {
    args.first()
        .map(Path::new)
        .context("Missing <snapshot.json> argument")
}

fn run_match(args: &[String]) -> Result<()> {
    let (config_path, args) = split_config_flag(args)?;
    let snapshot_path = snapshot_arg(&args)?;
    let name = args.get(1).context("Missing <name> argument")?;

    let config = load_config(config_path.as_deref())?;
    let store = load_snapshot(snapshot_path)?.into_store(config.normalizer());

    let mut query = RawRecord::new(name.clone(), SourceType::parse("query"));
    query.constituency = args.get(2).cloned();

    let result = config.match_engine().find_match(&query, &store);
    match result.index.and_then(|i| store.get(i)) {
        Some(member) => {
            println!("✓ {} ({})", member.name(), result.tier.as_str());
            println!("  id:           {}", member.id);
            println!("  constituency: {}", member.constituency.as_deref().unwrap_or("-"));
            println!("  county:       {}", member.county.as_deref().unwrap_or("-"));
            println!("  party:        {}", member.party.as_deref().unwrap_or("-"));
            if result.score > 0 {
                println!("  shared tokens: {}", result.score);
            }
            if result.ambiguous {
                println!("⚠️  Ambiguous: other members also qualify at this tier");
            }
        }
        None => println!("❌ No match for {:?}", name),
    }

    Ok(())
}

fn print_counts(title: &str, counts: &BTreeMap<String, usize>) {
    println!("\n{}", title);
    let mut sorted: Vec<(&String, &usize)> = counts.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (key, count) in sorted {
        println!("  {:<32} {:>5}", key, count);
    }
}

fn run_stats(args: &[String]) -> Result<()> {
    let (config_path, args) = split_config_flag(args)?;
    let snapshot_path = snapshot_arg(&args)?;
    let config = load_config(config_path.as_deref())?;
    let snapshot = load_snapshot(snapshot_path)?;
    let saved_at = snapshot.saved_at;
    let store = snapshot.into_store(config.normalizer());

    println!("📊 {} members (saved {})", store.len(), saved_at);

    let mut by_source: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_county: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_party: BTreeMap<String, usize> = BTreeMap::new();

    for member in store.all() {
        for source in member.data_sources() {
            *by_source.entry(source.name().to_string()).or_insert(0) += 1;
        }
        let county = member.county.clone().unwrap_or_else(|| "(none)".to_string());
        *by_county.entry(county).or_insert(0) += 1;
        let party = member.party.clone().unwrap_or_else(|| "(none)".to_string());
        *by_party.entry(party).or_insert(0) += 1;
    }

    print_counts("By source:", &by_source);
    print_counts("By county:", &by_county);
    print_counts("By party:", &by_party);

    let ambiguous = store.ambiguous_regions();
    if !ambiguous.is_empty() {
        println!("\n⚠️  Constituencies claimed by more than one member:");
        for (region, count) in ambiguous {
            println!("  {:<32} {:>5}", region, count);
        }
    }

    Ok(())
}

// ============================================================================
// UI
// ============================================================================

#[cfg(feature = "tui")]
fn run_ui_mode(args: &[String]) -> Result<()> {
    let snapshot_path = snapshot_arg(args)?;

    println!("🖥️  Loading Member Registry UI...\n");
    let snapshot = load_snapshot(snapshot_path)?;
    println!("✓ Loaded {} members\n", snapshot.members.len());
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(snapshot.members);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_args: &[String]) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin registry-server --features server");
    std::process::exit(1);
}
