use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;
use sqlx::{Connection, SqliteConnection};

use crate::{
    cast::Engine,
    catalog::Catalog,
    equipment,
    models::{NetInstance, Player, RodInstance},
    nets, profile,
    roll::Dice,
    Result,
};

/// Why a shop action was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Refusal {
    ProfileMissing,
    /// No such item or location in the catalog.
    Unknown { name: String },
    InsufficientFunds { price: i64, balance: i64 },
    NotOwned { name: String },
    /// Unlimited nets can only be bought once.
    AlreadyOwned { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Purchase {
    Rod(RodInstance),
    Bait { name: String, quantity: i64 },
    Net(NetInstance),
    Equipped { name: String },
    Travelled { location: String },
}

pub type ShopResult = std::result::Result<Purchase, Refusal>;

pub async fn bait_quantity(conn: &mut SqliteConnection, user_id: i64, bait_name: &str) -> Result<i64> {
    let quantity: Option<i64> =
        sqlx::query_scalar("SELECT quantity FROM bait_inventory WHERE user_id = ? AND bait_name = ?")
            .bind(user_id)
            .bind(bait_name)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(quantity.unwrap_or(0))
}

/// Adds `quantity` units of bait and returns the new stock.
pub async fn add_bait(
    conn: &mut SqliteConnection,
    user_id: i64,
    bait_name: &str,
    quantity: i64,
) -> Result<i64> {
    let stock = sqlx::query_scalar(
        "INSERT INTO bait_inventory (user_id, bait_name, quantity) VALUES (?, ?, ?)
         ON CONFLICT (user_id, bait_name) DO UPDATE SET quantity = quantity + excluded.quantity
         RETURNING quantity",
    )
    .bind(user_id)
    .bind(bait_name)
    .bind(quantity)
    .fetch_one(&mut *conn)
    .await?;

    Ok(stock)
}

/// Uses up one unit of a finite bait. Returns `true` when the player has no
/// more of it and has to fall back to the default bait.
pub async fn consume_bait(
    conn: &mut SqliteConnection,
    catalog: &Catalog,
    user_id: i64,
    bait_name: &str,
) -> Result<bool> {
    if catalog.bait(bait_name).map_or(false, |bait| bait.infinite) {
        return Ok(false);
    }

    let left: Option<i64> = sqlx::query_scalar(
        "UPDATE bait_inventory SET quantity = quantity - 1
         WHERE user_id = ? AND bait_name = ? AND quantity > 0
         RETURNING quantity",
    )
    .bind(user_id)
    .bind(bait_name)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(left.map_or(true, |left| left == 0))
}

impl Engine {
    async fn charge(
        conn: &mut SqliteConnection,
        player: &mut Player,
        price: i64,
    ) -> Result<Option<Refusal>> {
        if player.coins < price {
            return Ok(Some(Refusal::InsufficientFunds {
                price,
                balance: player.coins,
            }));
        }

        player.coins -= price;
        profile::save(conn, player).await?;
        Ok(None)
    }

    /// Buys a rod and equips it. Buying a rod the player already owns gives a
    /// fresh one.
    pub async fn buy_rod<D: Dice>(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        chat_id: Option<i64>,
        rod_name: &str,
        dice: &mut D,
    ) -> Result<ShopResult> {
        let Some(rod) = self.catalog().rod(rod_name) else {
            return Ok(Err(Refusal::Unknown {
                name: rod_name.to_string(),
            }));
        };

        let mut tx = conn.begin().await?;
        let Some(mut player) = profile::load(&mut tx, user_id, chat_id).await? else {
            return Ok(Err(Refusal::ProfileMissing));
        };

        player.current_rod = rod.name.clone();
        if let Some(refusal) = Self::charge(&mut tx, &mut player, rod.price).await? {
            return Ok(Err(refusal));
        }
        let instance = equipment::create_rod(&mut tx, user_id, rod, dice).await?;

        tx.commit().await?;

        info!("{} bought a {} for ${}", player.username, rod.name, rod.price);
        Ok(Ok(Purchase::Rod(instance)))
    }

    pub async fn equip_rod(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        chat_id: Option<i64>,
        rod_name: &str,
    ) -> Result<ShopResult> {
        let Some(rod) = self.catalog().rod(rod_name) else {
            return Ok(Err(Refusal::Unknown {
                name: rod_name.to_string(),
            }));
        };

        let mut tx = conn.begin().await?;
        let Some(mut player) = profile::load(&mut tx, user_id, chat_id).await? else {
            return Ok(Err(Refusal::ProfileMissing));
        };

        let owned = equipment::get_rod(&mut tx, user_id, &rod.name).await?.is_some();
        if !owned && rod.name != self.config().baseline_rod {
            return Ok(Err(Refusal::NotOwned {
                name: rod.name.clone(),
            }));
        }

        player.current_rod = rod.name.clone();
        profile::save(&mut tx, &mut player).await?;
        tx.commit().await?;

        debug!("{} equipped {}", player.username, rod.name);
        Ok(Ok(Purchase::Equipped {
            name: rod.name.clone(),
        }))
    }

    pub async fn buy_bait(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        chat_id: Option<i64>,
        bait_name: &str,
        quantity: u32,
    ) -> Result<ShopResult> {
        let Some(bait) = self.catalog().bait(bait_name) else {
            return Ok(Err(Refusal::Unknown {
                name: bait_name.to_string(),
            }));
        };

        let mut tx = conn.begin().await?;
        let Some(mut player) = profile::load(&mut tx, user_id, chat_id).await? else {
            return Ok(Err(Refusal::ProfileMissing));
        };

        let price = bait.price * i64::from(quantity);
        if let Some(refusal) = Self::charge(&mut tx, &mut player, price).await? {
            return Ok(Err(refusal));
        }
        let stock = add_bait(&mut tx, user_id, &bait.name, i64::from(quantity)).await?;

        tx.commit().await?;

        info!(
            "{} bought {quantity} {} for ${price}",
            player.username, bait.name
        );
        Ok(Ok(Purchase::Bait {
            name: bait.name.clone(),
            quantity: stock,
        }))
    }

    pub async fn equip_bait(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        chat_id: Option<i64>,
        bait_name: &str,
    ) -> Result<ShopResult> {
        let Some(bait) = self.catalog().bait(bait_name) else {
            return Ok(Err(Refusal::Unknown {
                name: bait_name.to_string(),
            }));
        };

        let mut tx = conn.begin().await?;
        let Some(mut player) = profile::load(&mut tx, user_id, chat_id).await? else {
            return Ok(Err(Refusal::ProfileMissing));
        };

        if !bait.infinite && bait_quantity(&mut tx, user_id, &bait.name).await? == 0 {
            return Ok(Err(Refusal::NotOwned {
                name: bait.name.clone(),
            }));
        }

        player.current_bait = bait.name.clone();
        profile::save(&mut tx, &mut player).await?;
        tx.commit().await?;

        Ok(Ok(Purchase::Equipped {
            name: bait.name.clone(),
        }))
    }

    /// Buys a net. Finite nets gain another `max_uses` uses on every purchase.
    pub async fn buy_net(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        chat_id: Option<i64>,
        net_name: &str,
    ) -> Result<ShopResult> {
        let Some(net) = self.catalog().net(net_name) else {
            return Ok(Err(Refusal::Unknown {
                name: net_name.to_string(),
            }));
        };

        let mut tx = conn.begin().await?;
        let Some(mut player) = profile::load(&mut tx, user_id, chat_id).await? else {
            return Ok(Err(Refusal::ProfileMissing));
        };

        if net.max_uses.is_none() && nets::get_net(&mut tx, user_id, &net.name).await?.is_some() {
            return Ok(Err(Refusal::AlreadyOwned {
                name: net.name.clone(),
            }));
        }

        if let Some(refusal) = Self::charge(&mut tx, &mut player, net.price).await? {
            return Ok(Err(refusal));
        }
        let instance = nets::add_uses(&mut tx, user_id, net).await?;

        tx.commit().await?;

        info!("{} bought a {} for ${}", player.username, net.name, net.price);
        Ok(Ok(Purchase::Net(instance)))
    }

    pub async fn travel(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        chat_id: Option<i64>,
        location: &str,
    ) -> Result<ShopResult> {
        let Some(location) = self
            .catalog()
            .locations
            .iter()
            .find(|known| known.eq_ignore_ascii_case(location.trim()))
        else {
            return Ok(Err(Refusal::Unknown {
                name: location.to_string(),
            }));
        };

        let mut tx = conn.begin().await?;
        let Some(mut player) = profile::load(&mut tx, user_id, chat_id).await? else {
            return Ok(Err(Refusal::ProfileMissing));
        };

        player.current_location = location.clone();
        profile::save(&mut tx, &mut player).await?;
        tx.commit().await?;

        debug!("{} travelled to {location}", player.username);
        Ok(Ok(Purchase::Travelled {
            location: location.clone(),
        }))
    }

    /// Stars needed to repair the player's instance of `rod_name`.
    pub async fn repair_quote(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        rod_name: &str,
    ) -> Result<Option<i64>> {
        Ok(equipment::get_rod(conn, user_id, rod_name)
            .await?
            .map(|rod| rod.repair_cost(self.config().full_repair_price)))
    }

    pub async fn repair(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        rod_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RodInstance>> {
        equipment::repair_rod(conn, user_id, rod_name, now).await
    }
}
