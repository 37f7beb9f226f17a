use colstream::read::inspect::inspect;

fn main() -> Result<(), String> {
    let filename = std::env::args()
        .nth(1)
        .ok_or_else(|| "usage: csinspect <filename>".to_string())?;
    let data = std::fs::read(&filename).map_err(|e| format!("Error opening {filename}: {e:?}"))?;
    let tables = inspect(&data)?;
    println!("{tables}");
    Ok(())
}
