use std::collections::BTreeMap;

use chrono::NaiveDate;
use epitensor::model::policy::PolicyWindow;
use epitensor::model::testing::Testing;
use epitensor::model::travel::TravelImportation;
use epitensor::{
    AgeParameters, Compartment, HealthStage, IsolationState, ModelConfig, ScenarioInputs, Simulation, SolverMethod,
    TestState, TransitionAssembler,
};

fn inputs(n_age: usize, population: f64) -> ScenarioInputs {
    let scale = population / 100_000.0;
    ScenarioInputs {
        population: vec![population; n_age],
        ages: AgeParameters {
            yearly_baseline_admissions: vec![3650.0 * scale; n_age],
            hospital_mean_length_of_stay: vec![5.0; n_age],
            clinical_staff_ratio: vec![0.01; n_age],
            ae_attendance_risk: vec![0.3; n_age],
            admitted_fraction: vec![0.01; n_age],
            deaths: vec![200.0 * scale; n_age],
        },
        mixing_baseline: vec![vec![2.0; n_age]; n_age],
        mixing_distancing: vec![vec![0.5; n_age]; n_age],
        mixing_isolation: None,
        historical_pcr_tests: BTreeMap::new(),
    }
}

fn euler(steps_per_day: usize) -> ModelConfig {
    let mut config = ModelConfig::default();
    config.solver.method = SolverMethod::Euler { steps_per_day };
    config
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn travel_seeds_the_epidemic_from_a_disease_free_start() {
    let inputs = inputs(1, 1_000_000.0);
    let mut config = euler(20);
    // importation measured on its own: imported cases infect nobody
    config.transmission.infectiousness = [0.0; 4];
    config.transmission.elevated_hospital_mixing_ratio = 0.0;
    let sim = Simulation::from_inputs(&inputs, &config).unwrap();
    let init = sim.initial_state();
    assert_eq!(init.health_total(HealthStage::Exposed), 0.0);
    assert!((init.total() - 1_000_000.0).abs() < 1e-4);

    let traj = sim.run(&init, 10).unwrap();
    assert_eq!(traj.records.len(), 11);
    assert_eq!(traj.records[0].new_cumulative.total(), 0.0);
    for record in &traj.records {
        assert!(
            (record.current.total() - 1_000_000.0).abs() < 1e-4,
            "day {}: {}",
            record.day,
            record.current.total()
        );
    }

    let pool = Compartment::new(HealthStage::Susceptible, IsolationState::Unrestricted, TestState::Untested);
    let arrived = pool.with_health(HealthStage::Exposed);
    // Prevalence among travellers is zero on day 0.
    let exposed_new = |day: usize| traj.records[day].new_cumulative[(0, arrived)];
    assert_eq!(exposed_new(1), 0.0);
    assert_eq!(traj.records[1].new_cumulative.health_total(HealthStage::Exposed), 0.0);

    let travel = TravelImportation::build(&config.travel, &[1.0]);
    for day in 1..10 {
        let s_start = traj.records[day].current[(0, pool)];
        let s_end = traj.records[day + 1].current[(0, pool)];
        let expected = travel.rates_at(day as f64)[0] * 0.5 * (s_start + s_end);
        let got = exposed_new(day + 1) - exposed_new(day);
        assert!(expected > 0.0);
        assert!(
            (got - expected).abs() / expected < 1e-3,
            "day {}: {} vs {}",
            day,
            got,
            expected
        );
    }
}

#[test]
fn population_is_conserved_and_inflow_only_grows() {
    let inputs = inputs(2, 250_000.0);
    let mut config = ModelConfig::default();
    config.policies.social_distancing = Some(PolicyWindow::new(ymd(2020, 3, 20), ymd(2020, 5, 1)));
    config.policies.case_isolation = Some(PolicyWindow::new(ymd(2020, 3, 25), ymd(2020, 6, 1)));
    let sim = Simulation::from_inputs(&inputs, &config).unwrap();
    let init = sim.initial_state();
    let traj = sim.run(&init, 60).unwrap();

    for pair in traj.records.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        assert!((next.current.total() - init.total()).abs() / init.total() < 1e-6);
        for (i, (a, b)) in prev
            .new_cumulative
            .as_slice()
            .iter()
            .zip(next.new_cumulative.as_slice())
            .enumerate()
        {
            assert!(*b >= a - 1e-6 * a.abs().max(1.0), "cell {} inflow fell from {} to {}", i, a, b);
        }
    }
    let last = traj.last().unwrap();
    assert!(last.current.health_total(HealthStage::Exposed) > 0.0);
    for record in &traj.records {
        for (age, c, v) in record.current.iter() {
            assert!(v > -1e-6 * 250_000.0, "day {} age {} {:?}: {}", record.day, age, c, v);
        }
    }
}

#[test]
fn identical_age_groups_evolve_identically() {
    let inputs = inputs(2, 100_000.0);
    let sim = Simulation::from_inputs(&inputs, &euler(10)).unwrap();
    let mut init = sim.initial_state();
    let sick = Compartment::new(HealthStage::SymptomaticEarly, IsolationState::Unrestricted, TestState::Untested);
    let susceptible = sick.with_health(HealthStage::Susceptible);
    for age in 0..2 {
        init[(age, susceptible)] -= 20.0;
        init[(age, sick)] += 20.0;
    }
    let traj = sim.run(&init, 30).unwrap();
    let last = &traj.last().unwrap().current;
    for c in Compartment::all() {
        let (a, b) = (last[(0, c)], last[(1, c)]);
        assert!((a - b).abs() <= 1e-9 * a.abs().max(1.0), "{:?}: {} vs {}", c, a, b);
    }
}

#[test]
fn fully_hospitalised_case_isolation_sends_no_symptomatic_case_home() {
    let inputs = inputs(1, 100_000.0);
    let mut config = ModelConfig::default();
    config.policies.reference_start = ymd(2020, 6, 1);
    config.policies.case_isolation = Some(PolicyWindow::new(ymd(2020, 6, 1), ymd(2020, 7, 1)));
    config.quarantine.mean_hospitalised_fraction = 1.0;
    let assembler = TransitionAssembler::new(&inputs, &config).unwrap();

    let mut state = assembler.initial_state();
    let sick = Compartment::new(HealthStage::SymptomaticEarly, IsolationState::Unrestricted, TestState::Untested);
    let quiet = sick.with_health(HealthStage::Asymptomatic);
    state[(0, sick)] = 500.0;
    state[(0, quiet)] = 500.0;
    let tensor = assembler.assemble(1.0, &state).unwrap();

    let positive = TestState::VirusPositive;
    for health in [HealthStage::SymptomaticEarly, HealthStage::SymptomaticLate] {
        let from = sick.with_health(health);
        let home = from.with_test(positive).with_iso(IsolationState::HomeIsolated);
        assert_eq!(tensor.get(0, from, home), 0.0, "{:?}", health);
    }
    // every fresh positive is admitted at rate 1/lag
    let tests = Testing::build(&config.testing, &inputs.historical_pcr_tests)
        .transitions(&state, assembler.schedule().date_at(1.0));
    let tested_positive = tests.get(0, sick, positive);
    assert!(tested_positive > 0.0);
    let admitted = sick.with_test(positive).with_iso(IsolationState::Hospitalized);
    let expected = tested_positive / config.quarantine.isolation_lag;
    let got = tensor.get(0, sick, admitted);
    assert!((got - expected).abs() <= 1e-12 * expected, "{} vs {}", got, expected);

    let quiet_home = quiet.with_test(positive).with_iso(IsolationState::HomeIsolated);
    assert!(tensor.get(0, quiet, quiet_home) > 0.0);
    assert_eq!(tensor.get(0, quiet, quiet.with_test(positive)), 0.0);
}
