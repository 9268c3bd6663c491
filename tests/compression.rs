//! Transparent decompression against real on-disk fixtures.

#![cfg(any(
    feature = "compression-gzip",
    feature = "compression-zstd",
    feature = "compression-xz"
))]

use std::io::Write;
use std::path::Path;

use gridiron::{read_csv, Table};

const SAMPLE: &str = "city,lat,lng\noslo,59.91,10.75\nnairobi,-1.29,36.82\n";

fn check(table: &Table) {
    assert_eq!(table.names(), ["city", "lat", "lng"]);
    assert_eq!(table.nrows(), 2);
    assert_eq!(
        table.column_by_name("city").unwrap().as_str().unwrap(),
        &["oslo".to_string(), "nairobi".to_string()]
    );
    assert_eq!(
        table.column_by_name("lat").unwrap().as_float().unwrap(),
        &[59.91, -1.29]
    );
}

fn read_fixture(path: &Path) -> anyhow::Result<Table> {
    Ok(read_csv(path.to_str().unwrap())?)
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_input_is_detected_by_magic() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    // No .gz extension on purpose: detection is content-based.
    let path = dir.path().join("cities.bin");
    let mut enc = flate2::write::GzEncoder::new(
        std::fs::File::create(&path)?,
        flate2::Compression::default(),
    );
    enc.write_all(SAMPLE.as_bytes())?;
    enc.finish()?;

    check(&read_fixture(&path)?);
    Ok(())
}

#[cfg(feature = "compression-zstd")]
#[test]
fn zstd_input_is_detected_by_magic() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cities.zst");
    let packed = zstd::stream::encode_all(SAMPLE.as_bytes(), 3)?;
    std::fs::write(&path, packed)?;

    check(&read_fixture(&path)?);
    Ok(())
}

#[cfg(feature = "compression-xz")]
#[test]
fn xz_input_is_detected_by_magic() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cities.xz");
    let mut enc = xz2::write::XzEncoder::new(std::fs::File::create(&path)?, 6);
    enc.write_all(SAMPLE.as_bytes())?;
    enc.finish()?;

    check(&read_fixture(&path)?);
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn compressed_and_plain_inputs_agree() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let plain = dir.path().join("plain.csv");
    std::fs::write(&plain, SAMPLE)?;

    let gz = dir.path().join("packed.csv");
    let mut enc = flate2::write::GzEncoder::new(
        std::fs::File::create(&gz)?,
        flate2::Compression::best(),
    );
    enc.write_all(SAMPLE.as_bytes())?;
    enc.finish()?;

    assert_eq!(read_fixture(&plain)?, read_fixture(&gz)?);
    Ok(())
}
