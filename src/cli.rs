//! Command-line driver: creates a decision process from a configuration file and steps it
//! through the horizon, vaccinating between days as requested.
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context as _};
use clap::{Args, Command, FromArgMatches as _};
use log::info;

use crate::config::SimulationConfig;
use crate::mdp::{AgeGroup, ChildlessAgeGroup, CreateOptions, Mdp};
use crate::population::VaccineType;
use crate::StrideError;

/// Command-line arguments of the `stride-mdp` binary.
#[derive(Args, Debug, Clone)]
pub struct BaseArgs {
    /// Path of the JSON simulation configuration
    #[arg(short, long)]
    pub config: PathBuf,

    /// Random seed, overrides `run.rng_seed`
    #[arg(short, long)]
    pub random_seed: Option<u64>,

    /// Directory the output prefix is resolved against
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Output prefix; a trailing `/` makes it a directory. Defaults to `run.output_prefix`
    #[arg(short = 'p', long, default_value = "")]
    pub output_prefix: String,

    /// Log level, overrides `run.log_level`
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Number of days to simulate, overrides `run.num_days`
    #[arg(short, long)]
    pub days: Option<usize>,

    /// Vaccinate from the age groups without children
    #[arg(long)]
    pub childless: bool,

    /// Fraction of the population, drawn by household, eligible for vaccination
    #[arg(short, long, default_value_t = 1.0)]
    pub uptake: f64,

    /// Daily vaccination as `<age group>:<count>:<vaccine type>`, e.g. `elderly:100:mRNA`.
    /// May be repeated; requests are applied in order before each day
    #[arg(short, long = "vaccinate")]
    pub vaccinations: Vec<VaccinationRequest>,
}

/// The age group named in a vaccination request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RequestedGroup {
    Standard(AgeGroup),
    Childless(ChildlessAgeGroup),
}

/// One `--vaccinate` argument.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VaccinationRequest {
    pub group: RequestedGroup,
    pub count: usize,
    pub vaccine_type: VaccineType,
}

impl FromStr for VaccinationRequest {
    type Err = StrideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| {
            StrideError::ConfigInvalid(format!("invalid vaccination `{s}`: {reason}"))
        };
        let [group, count, vaccine_type] = s.split(':').collect::<Vec<_>>()[..] else {
            return Err(invalid("expected <age group>:<count>:<vaccine type>"));
        };
        let group = match group.parse::<AgeGroup>() {
            Ok(group) => RequestedGroup::Standard(group),
            Err(_) => RequestedGroup::Childless(
                group
                    .parse::<ChildlessAgeGroup>()
                    .map_err(|_| invalid("unknown age group"))?,
            ),
        };
        Ok(VaccinationRequest {
            group,
            count: count.parse().map_err(|_| invalid("count is not a number"))?,
            vaccine_type: vaccine_type
                .parse()
                .map_err(|_| invalid("unknown vaccine type"))?,
        })
    }
}

fn create_stride_cli() -> Command {
    let cli = Command::new("stride-mdp")
        .about("Steps an agent-based epidemic simulation through its horizon");
    BaseArgs::augment_args(cli)
}

/// Parses the process arguments and runs the simulation. Returns the total number of infected
/// persons at the end.
///
/// # Errors
/// Returns an error if argument parsing, configuration or a simulation step fails
pub fn run_with_args() -> anyhow::Result<usize> {
    let matches = create_stride_cli().get_matches();
    let args = BaseArgs::from_arg_matches(&matches)?;
    run_with_args_internal(args)
}

fn run_with_args_internal(args: BaseArgs) -> anyhow::Result<usize> {
    let mut config = SimulationConfig::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(level) = &args.log_level {
        config.run.log_level.clone_from(level);
    }
    if let Some(days) = args.days {
        config.run.num_days = days;
    }
    for request in &args.vaccinations {
        match (request.group, args.childless) {
            (RequestedGroup::Standard(group), true) => {
                bail!("age group {group} needs a childless group with --childless")
            }
            (RequestedGroup::Childless(group), false) => {
                bail!("age group {group} is only available with --childless")
            }
            _ => {}
        }
    }

    let mut mdp = Mdp::new();
    mdp.create(
        &config,
        CreateOptions {
            seed: args.random_seed,
            output_dir: args.output_dir.clone(),
            output_prefix: args.output_prefix.clone(),
            childless: args.childless,
            uptake: args.uptake,
            configure_logging: true,
        },
    )?;

    let mut infected = mdp.get_total_infected();
    for _ in 0..mdp.get_number_of_days() {
        for request in &args.vaccinations {
            match request.group {
                RequestedGroup::Standard(group) => {
                    mdp.vaccinate(request.count, group, request.vaccine_type)?;
                }
                RequestedGroup::Childless(group) => {
                    mdp.vaccinate_childless(request.count, group, request.vaccine_type)?;
                }
            }
        }
        infected = mdp.simulate_day()?;
    }
    mdp.end()?;
    info!("{infected} persons infected after {} days", mdp.current_day());
    mdp.clear_simulation();
    Ok(infected)
}
