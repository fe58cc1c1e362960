use sir_explorer::prelude::*;
use sir_explorer::runner::run_with_args;

/// One line per recompute on stdout.
fn print_update(update: &ViewUpdate) {
    let parameters = &update.parameters;
    match &update.outcome {
        Ok(output) => {
            let summary = output.result.summary();
            println!(
                "recompute {}: N={} I0={} R0={} beta={} gamma={} | reproduction number {:.3}, peak I={:.3} at t={:.3}, final R={:.3}",
                update.sequence,
                parameters.population,
                parameters.initial_infected,
                parameters.initial_recovered,
                parameters.infection_rate,
                parameters.recovery_rate,
                parameters.model().basic_reproduction_number(),
                summary.peak_infected,
                summary.peak_time,
                summary.final_state.recovered,
            );
        }
        Err(err) => println!("recompute {}: {err}", update.sequence),
    }
}

fn main() {
    let result = run_with_args(|context, args, _| {
        context.add_view(|_, update| print_update(update));
        if args.output_dir.is_some() {
            context.add_trajectory_report("trajectory")?;
            context.add_summary_report("summary")?;
        }
        Ok(())
    });
    if let Err(err) = result {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
