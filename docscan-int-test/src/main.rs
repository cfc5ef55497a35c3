use docscan::client::Query;
use docscan::errors::DocScanResult;
use docscan_int_test::test_util::{cleanup, create_batched_test_context, seed_users, User};

fn main() -> DocScanResult<()> {
    println!("Starting scan stress test...");
    let ctx = create_batched_test_context(4096)?;
    let client = ctx.client()?;

    let count = 100_000;
    let start = std::time::Instant::now();
    seed_users(&client, count)?;
    println!("Inserted {} records in {:?}", count, start.elapsed());

    let start = std::time::Instant::now();
    let mut visited = 0u64;
    let summary = client.query_by_cursor(&Query::all(), |_: User| {
        visited += 1;
        Ok(())
    })?;
    println!(
        "Scanned {} records in {} windows in {:?}",
        visited,
        summary.windows,
        start.elapsed()
    );

    let start = std::time::Instant::now();
    let page = client.query_page::<User>(&Query::all(), 100, 20)?;
    println!(
        "Read page {} of {} ({} records) in {:?}",
        page.page.page_no(),
        page.page.total_pages(),
        page.items.len(),
        start.elapsed()
    );

    cleanup(ctx)
}
