//! Account disambiguation screen.
//!
//! Shown when the username is attached to both a work account (AAD tile) and
//! a personal Microsoft account (MSA tile).

use tokio::time::sleep;

use super::{LoginContext, SHORT_PAUSE, StateError};

const AAD_TILE_TITLE: &str = "#aadTileTitle";
const MSA_TILE_TITLE: &str = "#msaTileTitle";

struct AccountTile {
    description: String,
    selector: &'static str,
}

pub(super) async fn handle(ctx: &mut LoginContext) -> Result<(), StateError> {
    log::debug!("multiple accounts associated with username");

    let mut tiles = Vec::new();
    for selector in [AAD_TILE_TITLE, MSA_TILE_TITLE] {
        if let Some(description) = ctx.session.text(selector).await?
            && !description.is_empty()
        {
            tiles.push(AccountTile {
                description,
                selector,
            });
        }
    }

    let chosen = match tiles.len() {
        0 => {
            return Err(StateError::PageParse(
                "no account tiles found on account selection screen".into(),
            ));
        }
        1 => &tiles[0],
        _ => {
            println!(
                "It looks like this Username is used with more than one account from Microsoft. Which one do you want to use?"
            );
            let descriptions: Vec<String> =
                tiles.iter().map(|tile| tile.description.clone()).collect();
            let answer = ctx
                .prompter
                .select("Account", &descriptions, Some(&descriptions[0]))
                .await?;
            tiles
                .iter()
                .find(|tile| tile.description == answer)
                .ok_or_else(|| StateError::PageParse("unable to find chosen account".into()))?
        }
    };

    log::debug!("proceeding with account {}", chosen.selector);
    ctx.session.click(chosen.selector).await?;
    sleep(SHORT_PAUSE).await;
    Ok(())
}
