//! Checkpoint schedule generation.
//!
//! Checkpoints start at data_date, step by the configured frequency, and
//! end exactly at data_date + horizon. Every action effective date and risk
//! log date inside the horizon is inserted as an extra checkpoint so no
//! state change falls between two samples. The result is strictly
//! increasing.

use crate::config::Frequency;
use chrono::{Days, Months, NaiveDate};

pub fn horizon_end(data_date: NaiveDate, horizon_months: u32) -> NaiveDate {
    data_date + Months::new(horizon_months)
}

pub fn build_checkpoints(
    data_date: NaiveDate,
    end: NaiveDate,
    frequency: Frequency,
    event_dates: impl Iterator<Item = NaiveDate>,
) -> Vec<NaiveDate> {
    let mut dates = vec![data_date];

    match frequency {
        Frequency::Weekly => {
            let mut date = data_date + Days::new(7);
            while date < end {
                dates.push(date);
                date = date + Days::new(7);
            }
        }
        Frequency::Monthly => {
            let mut months = 1;
            let mut date = data_date + Months::new(1);
            while date < end {
                dates.push(date);
                months += 1;
                date = data_date + Months::new(months);
            }
        }
    }
    dates.push(end);

    // State-change dates become checkpoints of their own. Dates at or
    // before the start are covered by t0; dates past the end never fire.
    for event in event_dates {
        if event > data_date && event < end {
            dates.push(event);
        }
    }

    dates.sort();
    dates.dedup();
    dates
}
