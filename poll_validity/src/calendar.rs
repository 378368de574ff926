use chrono::NaiveDate;
use log::{debug, info};

use crate::config::PollError;
use crate::table::{parse_date, PollSchema, Table};

// US presidential election days covered by the poll archives.
const ELECTION_DAYS: [(i32, u32, u32); 24] = [
    (1932, 11, 8),
    (1936, 11, 3),
    (1940, 11, 5),
    (1944, 11, 7),
    (1948, 11, 2),
    (1952, 11, 4),
    (1956, 11, 6),
    (1960, 11, 8),
    (1964, 11, 3),
    (1968, 11, 5),
    (1972, 11, 7),
    (1976, 11, 2),
    (1980, 11, 4),
    (1984, 11, 6),
    (1988, 11, 8),
    (1992, 11, 3),
    (1996, 11, 5),
    (2000, 11, 7),
    (2004, 11, 2),
    (2008, 11, 4),
    (2012, 11, 6),
    (2016, 11, 8),
    (2020, 11, 3),
    (2024, 11, 5),
];

pub fn election_day(year: i32) -> Option<NaiveDate> {
    ELECTION_DAYS
        .iter()
        .find(|(y, _, _)| *y == year)
        .and_then(|&(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
}

/// The polling period of one presidential cycle: from the day after the
/// previous election to the day before the election itself.
///
/// A bound is open when the neighbouring election is not in the calendar.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct ElectionWindow {
    pub year: i32,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl ElectionWindow {
    pub fn for_year(year: i32) -> ElectionWindow {
        ElectionWindow {
            year,
            start: election_day(year - 4).and_then(|d| d.succ_opt()),
            end: election_day(year).and_then(|d| d.pred_opt()),
        }
    }

    /// A poll falls in the window when it began after the start and ended
    /// before the end. An unknown date never satisfies a bound.
    pub fn contains(&self, begin: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
        let after_start = match self.start {
            Some(s) => begin.map(|b| b >= s).unwrap_or(false),
            None => true,
        };
        let before_end = match self.end {
            Some(e) => end.map(|x| x <= e).unwrap_or(false),
            None => true,
        };
        after_start && before_end
    }

    /// Keeps the rows of the table that fall in the window.
    pub fn filter(&self, table: &Table, schema: &PollSchema) -> Result<Table, PollError> {
        let column = |name: &Option<String>, bound: Option<NaiveDate>| -> Result<Option<usize>, PollError> {
            match (name, bound) {
                (_, None) => Ok(None),
                (Some(n), Some(_)) => table.require_column(n).map(Some),
                (None, Some(_)) => Err(PollError::MissingColumn {
                    column: "begin or end date".to_string(),
                }),
            }
        };
        let begin_idx = column(&schema.begin_date, self.start)?;
        let end_idx = column(&schema.end_date, self.end)?;
        debug!(
            "ElectionWindow::filter: year: {} start: {:?} end: {:?}",
            self.year, self.start, self.end
        );

        let res = table.filter_rows(|row| {
            let begin = begin_idx.and_then(|c| parse_date(&row[c]));
            let end = end_idx.and_then(|c| parse_date(&row[c]));
            self.contains(begin, end)
        });
        info!(
            "Election window {}: kept {} of {} rows",
            self.year,
            res.len(),
            table.len()
        );
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::table;

    fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    #[test]
    fn window_bounds() {
        let w = ElectionWindow::for_year(1940);
        assert_eq!(w.start, d(1936, 11, 4));
        assert_eq!(w.end, d(1940, 11, 4));

        let w1936 = ElectionWindow::for_year(1936);
        assert_eq!(w1936.start, d(1932, 11, 9));
        assert_eq!(w1936.end, d(1936, 11, 2));

        // No earlier election in the calendar.
        let first = ElectionWindow::for_year(1932);
        assert_eq!(first.start, None);
        assert_eq!(first.end, d(1932, 11, 7));

        let future = ElectionWindow::for_year(2028);
        assert_eq!(future.start, d(2024, 11, 6));
        assert_eq!(future.end, None);
    }

    #[test]
    fn filter_rows() {
        let t = table(
            &["QuestionID", "BegDate", "EndDate"],
            &[
                &["early", "1936-10-01", "1936-10-05"],
                &["in", "1937-01-10", "1937-01-15"],
                &["election day", "1940-11-01", "1940-11-05"],
                &["undated", "", ""],
            ],
        );
        let kept = ElectionWindow::for_year(1940)
            .filter(&t, &PollSchema::default())
            .unwrap();
        let ids: Vec<&str> = kept.rows().iter().map(|r| r[0].as_str()).collect();
        assert_eq!(ids, vec!["in"]);
    }

    #[test]
    fn filter_needs_the_date_columns() {
        let t = table(&["QuestionID", "BegDate"], &[]);
        let res = ElectionWindow::for_year(1940).filter(&t, &PollSchema::default());
        assert_eq!(
            res,
            Err(PollError::MissingColumn {
                column: "EndDate".to_string()
            })
        );
    }
}
