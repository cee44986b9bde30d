//! GeoEdit command-line shell.
//!
//! Drives the editing core against a tile stored as JSON, with a headless
//! draw surface standing in for the map.

mod fetch;

use clap::{Args, Parser, Subcommand};
use fetch::FileFetcher;
use geoedit_core::{
    DrawTool, EditorConfig, MapEditor, MemoryDrawSurface, NodeConfig, NodeId, SelectCandidate,
    Tile, hint,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use url::Url;

#[derive(Debug, Parser)]
#[command(name = "geoedit", version, about = "Edit the geometry nodes of a map form tile")]
struct Cli {
    /// Editor configuration (JSON). Defaults apply when absent.
    #[arg(long, global = true, env = "GEOEDIT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a node's draw tool menu
    Tools {
        #[command(flatten)]
        tile: TileArgs,
        node: String,
    },
    /// Print the bounds the map opens on
    Extent {
        #[command(flatten)]
        tile: TileArgs,
    },
    /// Replace a node's features with the content of a GeoJSON file
    Commit {
        #[command(flatten)]
        tile: TileArgs,
        node: String,
        file: PathBuf,
    },
    /// Copy a feature picked on the selectable layer into a node
    Select {
        #[command(flatten)]
        tile: TileArgs,
        node: String,
        /// Picked feature as JSON (`{"layer_id": ..., "properties": {...}}`)
        candidate: PathBuf,
    },
    /// Lint a GeoJSON file
    Lint { file: PathBuf },
}

#[derive(Debug, Args)]
struct TileArgs {
    /// Geometry nodes of the form (JSON array)
    #[arg(long, env = "GEOEDIT_NODES")]
    nodes: PathBuf,
    /// Tile to edit (JSON)
    #[arg(long)]
    tile: PathBuf,
    /// Where to write the edited tile. Defaults to stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("GeoJSON has {0} error(s), nothing committed")]
    Rejected(usize),
}

fn main() {
    env_logger::init();

    if let Err(e) = run(Cli::parse()) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => EditorConfig::from_path(path)?,
        None => EditorConfig::default(),
    };

    match cli.command {
        Command::Tools { tile, node } => {
            let editor = open(&tile, config)?;
            for option in editor.draw_tools(&NodeId::new(node))? {
                println!("{}\t{}", option.value, option.text);
            }
        }
        Command::Extent { tile } => {
            let editor = open(&tile, config)?;
            match editor.initial_view() {
                Some(view) => {
                    let b = view.bounds;
                    let json = serde_json::json!({
                        "bounds": [b.x0, b.y0, b.x1, b.y1],
                        "padding": view.padding,
                    });
                    println!("{}", serde_json::to_string_pretty(&json)?);
                }
                None => println!("null"),
            }
        }
        Command::Commit { tile, node, file } => {
            let mut editor = open(&tile, config)?;
            commit(&mut editor, &NodeId::new(node), &file)?;
            save(editor.into_tile(), tile.out.as_deref())?;
        }
        Command::Select {
            tile,
            node,
            candidate,
        } => {
            let mut config = config;
            if config.select_base_url.is_none() {
                // Relative geometry URLs point next to the candidate file.
                let path = std::fs::canonicalize(&candidate)?;
                config.select_base_url =
                    path.parent().and_then(|d| Url::from_directory_path(d).ok());
            }
            let mut editor = open(&tile, config)?;
            let candidate: SelectCandidate =
                serde_json::from_str(&std::fs::read_to_string(&candidate)?)?;
            let node = NodeId::new(node);
            editor.select_tool(&node, Some(DrawTool::SelectFeature))?;
            let ids = pollster::block_on(editor.select_feature(&candidate, &FileFetcher))?;
            log::info!("Selected {} feature(s) into node {}", ids.len(), node);
            save(editor.into_tile(), tile.out.as_deref())?;
        }
        Command::Lint { file } => {
            let hints = hint::hint(&std::fs::read_to_string(&file)?);
            println!("{}", serde_json::to_string_pretty(&hints)?);
            let errors = hints.iter().filter(|h| h.is_error()).count();
            if errors > 0 {
                return Err(CliError::Rejected(errors).into());
            }
        }
    }
    Ok(())
}

fn open(
    args: &TileArgs,
    config: EditorConfig,
) -> Result<MapEditor<MemoryDrawSurface>, Box<dyn std::error::Error>> {
    let nodes: Vec<NodeConfig> = serde_json::from_str(&std::fs::read_to_string(&args.nodes)?)?;
    let tile: Tile = serde_json::from_str(&std::fs::read_to_string(&args.tile)?)?;
    log::debug!("Loaded tile {:?} with {} node(s)", tile.tileid, nodes.len());
    Ok(MapEditor::new(config, nodes, tile, MemoryDrawSurface::new())?)
}

fn commit(
    editor: &mut MapEditor<MemoryDrawSurface>,
    node: &NodeId,
    file: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(file)?;
    let now = Instant::now();
    editor.edit_geojson(node, now)?;
    editor.set_geojson_text(text, now)?;

    let errors = editor.validate_geojson();
    if !editor.update_geojson()? {
        for error in &errors {
            match error.line {
                Some(line) => log::error!("line {}: {}", line, error.message),
                None => log::error!("{}", error.message),
            }
        }
        return Err(CliError::Rejected(errors.len()).into());
    }
    Ok(())
}

fn save(tile: Tile, out: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(&tile)?;
    match out {
        Some(path) => {
            std::fs::write(path, json)?;
            log::info!("Wrote tile to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoedit_core::{FeatureCollection, TileField};

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    fn tile_args(dir: &Path) -> TileArgs {
        let nodes = write(
            dir,
            "nodes.json",
            r#"[{"node_id": "site", "geometry_types": ["Point", "Polygon"]}]"#,
        );
        let tile = write(dir, "tile.json", r#"{"tileid": "t1", "data": {"site": null}}"#);
        TileArgs {
            nodes,
            tile,
            out: Some(dir.join("out.json")),
        }
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "geoedit", "commit", "--nodes", "n.json", "--tile", "t.json", "site", "f.json",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Commit { ref node, .. } if node == "site"));
    }

    #[test]
    fn test_commit_writes_node() {
        let dir = tempfile::tempdir().unwrap();
        let args = tile_args(dir.path());
        let file = write(
            dir.path(),
            "site.geojson",
            r#"{"type":"Point","coordinates":[2.35,48.85]}"#,
        );

        let mut editor = open(&args, EditorConfig::default()).unwrap();
        commit(&mut editor, &"site".into(), &file).unwrap();
        save(editor.into_tile(), args.out.as_deref()).unwrap();

        let text = std::fs::read_to_string(dir.path().join("out.json")).unwrap();
        let tile: Tile = serde_json::from_str(&text).unwrap();
        let Some(TileField::Observable(Some(collection))) = tile.field(&"site".into()) else {
            panic!("site not written");
        };
        assert_eq!(collection.features.len(), 1);
        assert_eq!(collection.features[0].node_id(), Some("site"));
    }

    #[test]
    fn test_commit_rejects_invalid_geojson() {
        let dir = tempfile::tempdir().unwrap();
        let args = tile_args(dir.path());
        let file = write(
            dir.path(),
            "bad.geojson",
            r#"{"type":"LineString","coordinates":[[0,0]]}"#,
        );

        let mut editor = open(&args, EditorConfig::default()).unwrap();
        assert!(commit(&mut editor, &"site".into(), &file).is_err());
        assert_eq!(
            editor.tile().field(&"site".into()),
            Some(&TileField::Observable(None))
        );
    }

    #[test]
    fn test_select_from_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let args = tile_args(dir.path());
        let remote = write(
            dir.path(),
            "parcel.json",
            r#"{"type":"FeatureCollection","features":[{"type":"Feature","geometry":{"type":"Point","coordinates":[1,1]},"properties":{"owner":"x"}}]}"#,
        );
        let url = Url::from_file_path(&remote).unwrap();
        let candidate: SelectCandidate = serde_json::from_value(serde_json::json!({
            "properties": {"geojson": url.to_string()}
        }))
        .unwrap();

        let mut editor = open(&args, EditorConfig::default()).unwrap();
        let node = NodeId::new("site");
        editor.select_tool(&node, Some(DrawTool::SelectFeature)).unwrap();
        pollster::block_on(editor.select_feature(&candidate, &FileFetcher)).unwrap();

        let features: &FeatureCollection = match editor.tile().field(&node) {
            Some(TileField::Observable(Some(collection))) => collection,
            other => panic!("unexpected field {:?}", other),
        };
        assert_eq!(features.features.len(), 1);
        assert!(features.features[0].properties.get("owner").is_none());
    }

    #[test]
    fn test_select_relative_to_base() {
        let dir = tempfile::tempdir().unwrap();
        let args = tile_args(dir.path());
        write(
            dir.path(),
            "parcel.json",
            r#"{"type":"Point","coordinates":[4,5]}"#,
        );
        let candidate: SelectCandidate = serde_json::from_value(serde_json::json!({
            "properties": {"geojson": "parcel.json"}
        }))
        .unwrap();
        let config = EditorConfig {
            select_base_url: Url::from_directory_path(dir.path()).ok(),
            ..EditorConfig::default()
        };

        let mut editor = open(&args, config).unwrap();
        let node = NodeId::new("site");
        editor.select_tool(&node, Some(DrawTool::SelectFeature)).unwrap();
        pollster::block_on(editor.select_feature(&candidate, &FileFetcher)).unwrap();
        assert_eq!(editor.features_for_node(&node).unwrap().len(), 1);
    }
}
