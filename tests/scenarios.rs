use std::path::{Path, PathBuf};

use stride_mdp::calendar::{ScheduleCategory, ScheduleEntry};
use stride_mdp::config::SimulationConfig;
use stride_mdp::{AgeGroup, CreateOptions, Mdp, StrideError, VaccineType};

fn data(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

fn epidemic() -> SimulationConfig {
    SimulationConfig::from_file(&data("epidemic.json")).unwrap()
}

fn options(dir: &Path) -> CreateOptions {
    CreateOptions {
        output_dir: dir.to_path_buf(),
        output_prefix: "run/".to_string(),
        configure_logging: false,
        ..CreateOptions::default()
    }
}

fn created(config: &SimulationConfig, options: CreateOptions) -> Mdp {
    let mut mdp = Mdp::new();
    mdp.create(config, options).unwrap();
    mdp
}

fn total_infected_after_horizon(config: &SimulationConfig, seed: u64) -> usize {
    let dir = tempfile::tempdir().unwrap();
    let mut mdp = created(
        config,
        CreateOptions {
            seed: Some(seed),
            ..options(dir.path())
        },
    );
    let days = mdp.get_number_of_days();
    mdp.simulate(days).unwrap()
}

#[test]
fn imported_cases_start_an_outbreak() {
    let dir = tempfile::tempdir().unwrap();
    let mut mdp = created(&epidemic(), options(dir.path()));

    mdp.simulate(1).unwrap();
    let day_zero: Vec<u32> = mdp
        .population()
        .unwrap()
        .iter()
        .filter(|person| person.health.infected_day() == Some(0))
        .map(|person| person.id())
        .collect();
    assert_eq!(day_zero.len(), 10);

    mdp.simulate(6).unwrap();
    assert_eq!(mdp.current_day(), 7);
    let population = mdp.population().unwrap();
    for id in &day_zero {
        assert!(!population.get(*id).unwrap().health.is_exposed());
    }

    let infected = mdp.simulate(3).unwrap();
    assert!(infected >= 10);
    assert_eq!(infected, mdp.get_total_infected());
    assert!(matches!(
        mdp.simulate_day(),
        Err(StrideError::OutOfHorizon { day: 11, horizon: 10 })
    ));
}

#[test]
fn closing_workplaces_reduces_the_outbreak() {
    let open = epidemic();
    let mut closed = epidemic();
    closed.calendar.entries.push(ScheduleEntry {
        category: ScheduleCategory::WorkplaceDistancing,
        date: "2020-03-05".to_string(),
        end_date: Some("2020-03-11".to_string()),
        value: 1.0,
        age: None,
    });

    let seeds = [1, 2, 3];
    let open_total: usize = seeds
        .iter()
        .map(|seed| total_infected_after_horizon(&open, *seed))
        .sum();
    let closed_total: usize = seeds
        .iter()
        .map(|seed| total_infected_after_horizon(&closed, *seed))
        .sum();
    assert!(
        closed_total < open_total,
        "closed workplaces: {closed_total}, open: {open_total}"
    );
}

#[test]
fn sterilising_vaccine_protects_the_vaccinated() {
    let dir = tempfile::tempdir().unwrap();
    let mut mdp = created(&epidemic(), options(dir.path()));

    assert_eq!(
        mdp.vaccinate(100, AgeGroup::Adults, VaccineType::MRna).unwrap(),
        100
    );
    let vaccinated: Vec<u32> = mdp
        .population()
        .unwrap()
        .iter()
        .filter(|person| person.is_vaccinated())
        .map(|person| person.id())
        .collect();
    assert_eq!(vaccinated.len(), 100);

    mdp.simulate(10).unwrap();
    let population = mdp.population().unwrap();
    for id in vaccinated {
        let person = population.get(id).unwrap();
        assert!(person.age() >= 26 && person.age() <= 64);
        assert!(!person.health.has_been_infected(), "person {id} was infected");
    }
}

#[test]
fn half_uptake_selects_about_half_the_population() {
    let dir = tempfile::tempdir().unwrap();
    let mdp = created(
        &epidemic(),
        CreateOptions {
            uptake: 0.5,
            ..options(dir.path())
        },
    );
    let eligible = mdp.age_groups().unwrap().total_remaining();
    // Households have at most six members.
    assert!(eligible.abs_diff(500) <= 6, "{eligible} eligible");
}

#[test]
fn daily_vaccination_precedes_transmission() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = epidemic();
    config.run.num_days = 5;
    let mut mdp = created(&config, options(dir.path()));
    let children = mdp.age_groups().unwrap().initial_size(AgeGroup::Children);

    mdp.simulate_vaccinate(5, 10, AgeGroup::Children, VaccineType::MRna)
        .unwrap();
    let expected = children.min(50);
    assert_eq!(mdp.age_groups().unwrap().sampled(AgeGroup::Children), expected);

    let population = mdp.population().unwrap();
    let mut vaccinated = 0;
    for person in population.iter().filter(|person| person.is_vaccinated()) {
        vaccinated += 1;
        assert!(person.age() <= 4);
        let record = person.vaccine.unwrap();
        let vaccination_day = 5 - record.days_since;
        assert!(person
            .health
            .infected_day()
            .is_none_or(|day| day < vaccination_day));
    }
    assert_eq!(vaccinated, expected);

    mdp.end().unwrap();
    let mut reader =
        stride_mdp::csv::Reader::from_path(dir.path().join("run").join("vaccinations.csv"))
            .unwrap();
    let day_column = reader
        .headers()
        .unwrap()
        .iter()
        .position(|header| header == "day")
        .unwrap();
    let days: Vec<String> = reader
        .records()
        .map(|record| record.unwrap()[day_column].to_string())
        .collect();
    assert_eq!(days, ["0", "1", "2", "3", "4"]);
}

#[test]
fn ended_runs_refuse_to_step() {
    let dir = tempfile::tempdir().unwrap();
    let mut mdp = created(&epidemic(), options(dir.path()));
    mdp.simulate(2).unwrap();
    mdp.end().unwrap();
    assert!(matches!(mdp.simulate_day(), Err(StrideError::Ended)));
    assert_eq!(mdp.current_day(), 2);
    assert!(dir.path().join("run").join("summary.csv").exists());
}
