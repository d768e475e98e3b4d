#[tokio::main]
async fn main() {
    vanguard_lib::init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = vanguard_lib::run(args).await {
        eprintln!("vanguard: {e}");
        std::process::exit(1);
    }
}
