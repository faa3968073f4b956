use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use stride_mdp::config::SyntheticPopulationConfig;
use stride_mdp::contact::{infect_pools, AgeContactProfile, InfectorInputs};
use stride_mdp::context::Context;
use stride_mdp::disease::TransmissionProfile;
use stride_mdp::population::builder::{PopulationBuilder, SyntheticPopulationBuilder};
use stride_mdp::population::{ContactType, Population, StageDurations};
use stride_mdp::random::ContextRandomExt;

static POPULATION: usize = 20_000;
static SEED: u64 = 123;
static INFECTIOUS_EVERY: u32 = 20;

fn population(context: &Context) -> Population {
    let config: SyntheticPopulationConfig =
        serde_json::from_str(&format!(r#"{{ "size": {POPULATION} }}"#)).unwrap();
    let mut population = SyntheticPopulationBuilder::new(config)
        .build(context)
        .expect("failed to build population");
    for person in population.iter_mut() {
        if person.id() % INFECTIOUS_EVERY == 0 {
            person.health.start_infection(0, StageDurations::new(1, 5, 5));
            person.health.update();
        }
    }
    population
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut context = Context::new();
    context.init_random(SEED);
    let population = population(&context);
    let profile = AgeContactProfile::uniform(0.5);
    let transmission = TransmissionProfile::new(0.05);
    let inputs = InfectorInputs {
        population: &population,
        profile: &profile,
        transmission: &transmission,
        intensity: 1.0,
        distancing: 0.0,
        school: None,
    };
    let pools = population.pools().member_pools(ContactType::PrimaryCommunity);
    let streams = context.rng_streams();

    c.bench_function("infector primary communities serial", |bencher| {
        bencher.iter(|| {
            black_box(infect_pools(
                pools,
                &inputs,
                streams,
                0,
                ContactType::PrimaryCommunity,
                None,
            ))
        });
    });

    let thread_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .expect("failed to start threads");
    c.bench_function("infector primary communities 4 threads", |bencher| {
        bencher.iter(|| {
            black_box(infect_pools(
                pools,
                &inputs,
                streams,
                0,
                ContactType::PrimaryCommunity,
                Some(&thread_pool),
            ))
        });
    });
}

criterion_group!(infector_benches, criterion_benchmark);
criterion_main!(infector_benches);
