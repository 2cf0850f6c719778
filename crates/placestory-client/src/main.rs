use anyhow::{bail, Context, Result};
use chrono::Utc;
use placestory_client_lib::{init_tracing, AppState, ClientConfig, StagedMedia};
use placestory_shared::{PlaceId, StoryId, StoryRecord};

const USAGE: &str = "usage:
  placestory list [place]
  placestory upload <path> [place]
  placestory delete <story>
  placestory like <story>";

fn age(story: &StoryRecord) -> String {
    let Some(created) = story.created_at else {
        return "-".to_string();
    };
    let minutes = (Utc::now() - created).num_minutes().max(0);
    match minutes {
        0 => "just now".to_string(),
        m if m < 60 => format!("{m}m ago"),
        m if m < 24 * 60 => format!("{}h ago", m / 60),
        m => format!("{}d ago", m / (24 * 60)),
    }
}

fn parse_place(arg: Option<&String>) -> Result<Option<PlaceId>> {
    arg.map(|raw| raw.parse::<PlaceId>().with_context(|| format!("invalid place id: {raw}")))
        .transpose()
}

fn parse_story(arg: Option<&String>) -> Result<StoryId> {
    let raw = arg.context("missing story id")?;
    raw.parse::<StoryId>()
        .with_context(|| format!("invalid story id: {raw}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!("{USAGE}");
    };

    let mut state = AppState::new(ClientConfig::from_env())?;
    tracing::info!(api = %state.config.api_base_url, command = %command, "Starting placestory");

    match command.as_str() {
        "list" => {
            let place = parse_place(args.get(1))?;
            state.refresh(place).await?;

            let feed = state
                .feed
                .lock()
                .map_err(|e| anyhow::anyhow!("feed lock poisoned: {e}"))?;
            for group in feed.groups() {
                println!("{} (@{})", group.author.display_name(), group.author_id());
                for story in &group.stories {
                    println!(
                        "  #{:<6} {:<5} {:>3} likes{}  {}  {}",
                        story.id.0,
                        format!("{:?}", story.kind()).to_lowercase(),
                        story.like_count,
                        if story.viewer_like.is_liked() { " *" } else { "  " },
                        age(story),
                        story.media_url,
                    );
                }
            }
        }
        "upload" => {
            let path = args.get(1).context("missing file path")?;
            let place = parse_place(args.get(2))?;
            let staged = StagedMedia::from_gallery(path, None).await?;

            let story = state
                .upload(staged, place, |pct| eprint!("\ruploading... {pct:>3}%"))
                .await;
            eprintln!();
            let story = story?;
            println!("created story #{} ({:?})", story.id, story.kind());
        }
        "delete" => {
            let id = parse_story(args.get(1))?;
            state.refresh(None).await?;
            state.delete_story(id).await?;
            state.sync_events();
            println!("deleted story #{id}");
        }
        "like" => {
            let id = parse_story(args.get(1))?;
            state.refresh(None).await?;
            let story = state.toggle_like(id).await?;
            state.sync_events();
            let verb = if story.viewer_like.is_liked() { "liked" } else { "unliked" };
            println!("{verb} story #{id} ({} likes)", story.like_count);
        }
        other => bail!("unknown command: {other}\n{USAGE}"),
    }

    Ok(())
}
