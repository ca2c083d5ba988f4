use chunked_array_store::prelude::*;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Create a temporary directory for the array to live in.
    let tmp = tempfile::tempdir()?;
    let store = FileSystemStore::create(tmp.path().join("root.zarr"))?;

    // Build a header for a 20x10 i32 array, chunked 10x5, gzip-compressed.
    let header = HeaderBuilder::new(
        smallvec::smallvec![20, 10],
        smallvec::smallvec![10, 5],
        DataType::Int32,
    )
    .fill_value(serde_json::json!(-1))
    .compressor("gzip", serde_json::Map::new())
    .build()?;

    let arr = Array::create(&store, "my_array", header)?;

    // Write some data into the middle of the array.
    let data: Vec<i32> = (10..70).collect();
    let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_ne_bytes()).collect();
    arr.write_region(&[5, 2], &[10, 6], &bytes)?;

    // Read the whole array back and print it.
    let output = arr.read_all()?;
    let values: Vec<i32> = output
        .chunks_exact(4)
        .map(|b| i32::from_ne_bytes(b.try_into().unwrap()))
        .collect();
    println!("{values:?}");
    Ok(())
}
