use mock_server::Db;
use tokio::net::TcpListener;

/// `PORT` picks the port (default 3000); `--empty` starts without seed data.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let empty = std::env::args().any(|arg| arg == "--empty");
    let db = if empty { Db::default() } else { Db::seeded() };

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("detective agency api on http://{addr}/api (seeded: {})", !empty);
    mock_server::serve(listener, db).await
}
