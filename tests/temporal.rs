//! Date and datetime promotion through the full read path.

use std::io::Cursor;

use chrono::NaiveDate;
use gridiron::{read_tsv, ReaderBuilder};

#[test]
fn tsv_date_column_is_promoted() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("series.tsv");
    std::fs::write(&path, "date\tval\n2020-01-02\t1\n2020-01-03\t2\n")?;

    let t = read_tsv(path.to_str().unwrap())?;
    assert_eq!(
        t.column_by_name("date").unwrap().as_date().unwrap(),
        &[
            NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 3).unwrap()
        ]
    );
    assert_eq!(t.column_by_name("val").unwrap().as_int().unwrap(), &[1, 2]);
    Ok(())
}

#[test]
fn datetime_column_is_promoted() -> anyhow::Result<()> {
    let t = ReaderBuilder::csv().read_from(Cursor::new(
        b"ts\n2021-06-01T12:00:00\n2021-06-01T12:00:00.5\n".to_vec(),
    ))?;
    let ts = t.column_by_name("ts").unwrap().as_datetime().unwrap();
    assert_eq!(ts[0].date(), NaiveDate::from_ymd_opt(2021, 6, 1).unwrap());
    assert_eq!(ts[1].and_utc().timestamp_subsec_millis(), 500);
    Ok(())
}

#[test]
fn dates_with_missings_stay_nullable() -> anyhow::Result<()> {
    let t = ReaderBuilder::csv()
        .read_from(Cursor::new(b"d\n2020-01-02\n\n2020-01-04\n".to_vec()))?;
    let d = t.column_by_name("d").unwrap().as_date_opt().unwrap();
    assert_eq!(d[0], NaiveDate::from_ymd_opt(2020, 1, 2));
    assert_eq!(d[1], None);
    Ok(())
}

#[test]
fn invalid_calendar_dates_keep_the_strings() -> anyhow::Result<()> {
    // Shapes match the regex, but February 30th does not exist; the
    // conversion must silently back out.
    let t = ReaderBuilder::csv().read_from(Cursor::new(
        b"d\n2020-01-02\n2020-01-03\n2020-01-04\n2020-02-30\n".to_vec(),
    ))?;
    let d = t.column_by_name("d").unwrap().as_str().unwrap();
    assert_eq!(d[3], "2020-02-30");
    Ok(())
}

#[test]
fn near_date_strings_are_not_promoted() -> anyhow::Result<()> {
    let t = ReaderBuilder::csv()
        .read_from(Cursor::new(b"d\n2020-1-2\n2020-01-03\n".to_vec()))?;
    assert!(t.column_by_name("d").unwrap().as_str().is_some());
    Ok(())
}
