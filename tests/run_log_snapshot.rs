use chrono::NaiveDate;
use epitensor::io::run_log::{write_run_log, RunSummary};
use epitensor::{Compartment, DayRecord, HealthStage, IsolationState, StateTensor, TestState, Trajectory};

fn cell(health: HealthStage, iso: IsolationState) -> Compartment {
    Compartment::new(health, iso, TestState::Untested)
}

fn hand_built_trajectory() -> Trajectory {
    let mut day0 = StateTensor::zeros(1);
    day0[(0, cell(HealthStage::Susceptible, IsolationState::Unrestricted))] = 990.0;
    day0[(0, cell(HealthStage::Exposed, IsolationState::Unrestricted))] = 10.0;

    let mut day1 = StateTensor::zeros(1);
    day1[(0, cell(HealthStage::Susceptible, IsolationState::Unrestricted))] = 975.0;
    day1[(0, cell(HealthStage::Exposed, IsolationState::Unrestricted))] = 15.0;
    day1[(0, cell(HealthStage::SymptomaticEarly, IsolationState::Hospitalized))] = 8.0;
    day1[(0, cell(HealthStage::Deceased, IsolationState::Unrestricted))] = 2.0;
    let mut new1 = StateTensor::zeros(1);
    new1[(0, cell(HealthStage::Exposed, IsolationState::Unrestricted))] = 15.0;

    Trajectory {
        records: vec![
            DayRecord {
                day: 0,
                current: day0,
                new_cumulative: StateTensor::zeros(1),
            },
            DayRecord {
                day: 1,
                current: day1,
                new_cumulative: new1,
            },
        ],
    }
}

#[test]
fn run_log_summary() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let summary = RunSummary {
        run_id: "TEST-SMALL",
        start: NaiveDate::from_ymd_opt(2020, 3, 1).unwrap(),
        days: 1,
        solver: "Euler { steps_per_day: 10 }".to_string(),
        age_groups: 1,
    };
    let path = write_run_log(tmp.path(), &summary, &hand_built_trajectory()).expect("write run log");
    assert!(path.ends_with("run_TEST-SMALL.txt"));

    let s = std::fs::read_to_string(path).expect("read run log");
    insta::assert_snapshot!(s);
}
