use tilecluster::cluster::{ClusterBuilder, EquirectangularBackend};
use tilecluster::{
    Config, Coordinate, GeoBounds, ItemMarkerTiler, MarkerId, MarkerItem, MouseMode,
    NonEmptyIterator, ScreenSize, SortKey, ThumbnailTiler, TileIndex,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug to see detailed logs)
    env_logger::init();

    println!("=== tilecluster - Getting Started ===\n");

    // === TILE INDEX ===
    println!("1. Tile Index");
    println!("-------------");

    let paris = Coordinate::from_geo_url("geo:48.8566,2.3522").ok_or("bad geo url")?;
    for level in [0, 2, 5] {
        let index = TileIndex::from_coordinates(&paris, level);
        println!("   Paris at level {}: {} (south-west corner {})", level, index, index.to_coordinates());
    }
    println!();

    // === MARKERS ===
    println!("2. Marker Store");
    println!("---------------");

    let mut tiler = ItemMarkerTiler::from_items([
        MarkerItem::new(MarkerId(1), paris).with_timestamp(1_700_000_000),
        MarkerItem::new(MarkerId(2), Coordinate::new(48.8606, 2.3376)).with_rating(5),
        MarkerItem::new(MarkerId(3), Coordinate::new(51.5074, -0.1278)),
        MarkerItem::new(MarkerId(4), Coordinate::new(40.7128, -74.0060)),
    ])?;
    println!("   Stored {} markers", tiler.len());

    let non_empty: Vec<TileIndex> = NonEmptyIterator::new(&mut tiler, 1).collect();
    println!("   Non-empty tiles at level 1: {}", non_empty.len());

    let tile = TileIndex::from_coordinates(&paris, 0);
    let best = tiler.representative_marker(&tile, SortKey::HighestRatedFirst);
    println!("   Highest rated marker near Paris: {:?}\n", best);

    // === CLUSTERING ===
    println!("3. Clustering");
    println!("-------------");

    let mut builder = ClusterBuilder::with_tiler(Config::default(), tiler);
    let mut backend = EquirectangularBackend::new(GeoBounds::WORLD, ScreenSize::new(1024, 512), 3);
    builder.update_clusters(&mut backend);

    for (i, cluster) in builder.clusters().iter().enumerate() {
        println!(
            "   Cluster {} at {:?}: {} markers in {} tiles",
            i,
            cluster.pixel_pos,
            cluster.marker_count,
            cluster.tile_indices.len()
        );
    }

    // select the first cluster and recluster lazily
    builder.clusters_clicked(&[0], MouseMode::SelectThumbnail);
    builder.process_pending(&mut backend);
    println!(
        "   After click: cluster 0 selection is {:?}",
        builder.clusters()[0].group_state.selected()
    );

    println!("\n=== Done ===");
    Ok(())
}
