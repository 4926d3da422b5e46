//! Server Replacement Carbon Analysis
//!
//! Compares the hardware in service today with a candidate replacement and
//! reports embodied and operational carbon of both, and when the new
//! hardware pays back its embodied carbon.

use anyhow::{Context, Result};
use clap::Parser;

use tco2::breakeven::TimelinePoint;
use tco2::catalog::{CpuSpec, Dataset};
use tco2::cli::{
    add_commas, format_kg, format_kw, format_pct, format_ratio, format_years, percent_increase,
    ratio_decimals, Cli,
};
use tco2::comparison::{ComparisonModel, ComparisonResult, ComparisonState};
use tco2::config::EngineConfig;
use tco2::model::{ComponentBreakdown, ScalingPolicy, ServerConfiguration, Side, Workload};
use tco2::telemetry::init_tracing_with;

fn main() -> Result<()> {
    let args = Cli::parse();

    let mut config = EngineConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    init_tracing_with(&config.logging);

    let dataset = match &args.data_dir {
        Some(dir) => Dataset::from_dir(dir)
            .with_context(|| format!("loading datasets from {}", dir.display()))?,
        None => Dataset::builtin().context("loading built-in datasets")?,
    };

    if args.list_cpus
        || args.list_regions
        || args.list_presets
        || args.list_workloads
        || args.list_scaling
    {
        run_listing(&args, &dataset);
        return Ok(());
    }

    let model = ComparisonModel::new(dataset, &config);
    let mut state = model
        .initial_state(&config.session)
        .context("building session from configuration")?;
    let mut result = model.compute(&state)?;
    for update in args.to_updates()? {
        result = model
            .update(&mut state, update.clone())
            .with_context(|| format!("applying {update:?}"))?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if args.timeline {
        print_timeline(&result.timeline);
        return Ok(());
    }

    run_report(&model, &state, &result, args.verbose)
}

fn run_listing(args: &Cli, dataset: &Dataset) {
    if args.list_cpus {
        println!("=== CPU Catalog ===\n");
        for cpu in dataset.cpus.by_launch_year() {
            println!(
                "  {} - {:<30} {:>3} cores  {:>4} W",
                cpu.launch_year, cpu.id, cpu.core_count, cpu.tdp_w
            );
        }
        println!();
    }

    if args.list_regions {
        println!("=== Grid Carbon Intensity ===\n");
        for (region, intensity) in dataset.grid.iter() {
            println!("  {:<20} {:>5} gCO2/kWh", region.as_str(), intensity);
        }
        println!();
    }

    if args.list_presets {
        println!("=== Server Presets ===\n");
        for preset in dataset.presets.iter() {
            println!("  {:<22} {}", preset.id.as_str(), preset.name);
            println!(
                "  {:<22} {}, {} GB RAM, {} GB SSD, {} GB HDD",
                "", preset.cpu, preset.ram_gb, preset.ssd_gb, preset.hdd_gb
            );
        }
        println!();
    }

    if args.list_workloads {
        println!("=== Workloads ===\n");
        for workload in Workload::ALL {
            println!("  {:<12} {}", workload.name(), workload.description());
        }
        println!();
    }

    if args.list_scaling {
        println!("=== Scaling Policies ===\n");
        for policy in ScalingPolicy::ALL {
            println!("  {:<12} {}", policy.name(), policy.description());
        }
        println!();
    }
}

fn run_report(
    model: &ComparisonModel,
    state: &ComparisonState,
    result: &ComparisonResult,
    verbose: bool,
) -> Result<()> {
    println!("=== Server Replacement Carbon Analysis ===\n");

    println!("Configuration:");
    println!(
        "  Region:        {} ({} gCO2/kWh)",
        result.region, result.grid_intensity
    );
    println!("  Workload:      {}", result.workload);
    println!("  Scaling:       {}", result.scaling);
    if result.single_comparison {
        println!("  Mode:          current hardware only");
    }
    if !result.disabled_workloads.is_empty() {
        let names: Vec<&str> = result.disabled_workloads.iter().map(|w| w.name()).collect();
        println!("  Unavailable:   {}", names.join(", "));
    }
    println!();

    let sides: &[Side] = if state.single_comparison {
        &[Side::Current]
    } else {
        &Side::BOTH
    };
    for &side in sides {
        let config = state.side(side);
        let spec = model.dataset().cpus.get(config.cpu.as_str())?;
        print_server(side, config, spec);
    }

    println!("--- Performance and Power ---");
    let indicator = |v: Option<f64>| match v {
        Some(v) => add_commas(v, 1),
        None => "n/a".to_string(),
    };
    if result.single_comparison {
        println!(
            "  Performance:   {} {}",
            indicator(result.performance.current),
            result.workload
        );
        println!("  Power:         {}", format_kw(result.power_kw.current));
    } else {
        println!(
            "  Performance:   {} -> {} {}",
            indicator(result.performance.current),
            indicator(result.performance.new),
            result.workload
        );
        println!(
            "  Power:         {} -> {}",
            format_kw(result.power_kw.current),
            format_kw(result.power_kw.new)
        );
        if let (Some(perf), Some(power)) = (result.performance_ratio, result.power_ratio) {
            let decimals = ratio_decimals(perf, power);
            println!(
                "  Ratios:        {}x performance for {}x power",
                format_ratio(perf, decimals),
                format_ratio(power, decimals)
            );
        }
    }
    println!();

    let label = match result.emphasized {
        Side::Current => "Current",
        Side::New => "New",
    };
    print_breakdown(
        &format!("Embodied Carbon of {label} Hardware"),
        &result.capex_breakdown,
    );
    print_breakdown(
        &format!("Operational Carbon of {label} Hardware (per year)"),
        &result.opex_breakdown,
    );

    if !result.single_comparison {
        println!("--- Break-Even ---");
        match result.break_even {
            Some(point) => {
                println!("  Time:          {}", format_years(point.time_years));
                println!("  Cumulative:    {}", format_kg(point.cumulative_kg));
            }
            None => println!("  No break-even: operational carbon of the new hardware is not lower"),
        }
        println!();
    }

    if verbose {
        println!("--- Carbon Timeline ---");
        for point in &result.timeline {
            match point.new_kg {
                Some(new_kg) => println!(
                    "  {:>6.1} yr   current {:>16}   new {:>16}",
                    point.year,
                    format_kg(point.current_kg),
                    format_kg(new_kg)
                ),
                None => println!(
                    "  {:>6.1} yr   current {:>16}",
                    point.year,
                    format_kg(point.current_kg)
                ),
            }
        }
        println!();

        if !state.single_comparison {
            let current = model.dataset().cpus.get(state.current.cpu.as_str())?;
            let new = model.dataset().cpus.get(state.new.cpu.as_str())?;
            print_cpu_comparison(current, new);
        }
    }

    // Key takeaway
    if result.single_comparison {
        let embodied = result.emphasized_embodied_kg();
        let yearly = result.opex_breakdown.total();
        if yearly > 0.0 {
            println!(
                "KEY INSIGHT: Operation matches the embodied {} after {}.",
                format_kg(embodied),
                format_years(embodied / yearly)
            );
        } else {
            println!(
                "KEY INSIGHT: All {} of this hardware is embodied carbon.",
                format_kg(embodied)
            );
        }
        return Ok(());
    }
    match result.break_even {
        Some(point) if point.time_years == 0.0 => {
            println!("KEY INSIGHT: The new hardware is ahead from day one.");
        }
        Some(point) if point.time_years <= 5.0 => {
            println!(
                "KEY INSIGHT: Embodied carbon is repaid within {}.",
                format_years(point.time_years)
            );
        }
        Some(point) => {
            println!(
                "KEY INSIGHT: Payback takes {}; check the expected service life.",
                format_years(point.time_years)
            );
        }
        None => {
            println!("KEY INSIGHT: Keeping the current hardware emits less carbon.");
        }
    }
    Ok(())
}

fn print_server(side: Side, config: &ServerConfiguration, spec: &CpuSpec) {
    println!("--- {} ---", side.label());
    println!("  CPU:           {} ({})", spec.id, spec.launch_year);
    println!("  RAM:           {} GB", add_commas(config.ram_gb, 0));
    println!("  SSD:           {} GB", add_commas(config.ssd_gb, 0));
    println!("  HDD:           {} GB", add_commas(config.hdd_gb, 0));
    println!("  Utilization:   {:.1}%", config.utilization);
    println!();
}

fn print_breakdown(title: &str, breakdown: &ComponentBreakdown) {
    let total = breakdown.total();
    println!("--- {title} ---");
    for (component, value) in breakdown.iter() {
        println!(
            "  {:<14} {:>18}  ({})",
            format!("{component}:"),
            format_kg(value),
            format_pct(value, total)
        );
    }
    println!("  {:<14} {:>18}", "Total:", format_kg(total));
    println!();
}

fn print_cpu_comparison(current: &CpuSpec, new: &CpuSpec) {
    println!("--- CPU Specifications ---");
    let row = |name: &str, a: f64, b: f64, decimals: usize| {
        let change = match percent_increase(a, b) {
            Some(pct) if b > a => format!("new +{pct:.1}%"),
            Some(pct) => format!("current +{pct:.1}%"),
            None => String::new(),
        };
        println!(
            "  {:<16} {:>16} {:>16}   {}",
            name,
            add_commas(a, decimals),
            add_commas(b, decimals),
            change
        );
    };
    row("Launch year", current.launch_year as f64, new.launch_year as f64, 0);
    row("Cores", current.core_count as f64, new.core_count as f64, 0);
    row("Threads", current.thread_count as f64, new.thread_count as f64, 0);
    row("TDP (W)", current.tdp_w, new.tdp_w, 0);
    row("Die size (mm2)", current.die_size_mm2, new.die_size_mm2, 0);

    let counters = [
        ("SPECrate", current.specrate, new.specrate, 1),
        ("SPECspeed", current.specspeed, new.specspeed, 1),
        ("Sorted tuples/s", current.sorted_tuples_per_s, new.sorted_tuples_per_s, 1),
        ("TPC-H runs/h", current.tpch_runs_per_h, new.tpch_runs_per_h, 1),
        ("Tuples/J", current.sorted_tuples_per_joule, new.sorted_tuples_per_joule, 0),
        ("TPC-H runs/kJ", current.tpch_runs_per_kj, new.tpch_runs_per_kj, 3),
        ("SPECspeed/W", current.specspeed_per_tdp, new.specspeed_per_tdp, 2),
        ("SPECrate/W", current.specrate_per_tdp, new.specrate_per_tdp, 2),
    ];
    for (name, a, b, decimals) in counters {
        match (a, b) {
            (Some(a), Some(b)) => row(name, a, b, decimals),
            _ => println!(
                "  {:<16} {:>16} {:>16}",
                name,
                fmt_opt(a, decimals),
                fmt_opt(b, decimals)
            ),
        }
    }
    println!();
}

fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| add_commas(v, decimals))
}

fn print_timeline(points: &[TimelinePoint]) {
    println!("{}", TimelinePoint::csv_header());
    for point in points {
        println!("{}", point.to_csv());
    }
}
