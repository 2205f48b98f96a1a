// Hyperliquid adapter: REST POST /info {"type":"metaAndAssetCtxs"}

use super::hyperliquid_types::{AssetCtx, MetaAndAssetCtxs, PerpMarket};
use super::{AdapterError, VenueAdapter};
use crate::market_data::transport::Transport;
use crate::schema::{CanonicalRow, MarketMetrics, MarketType, SnapshotDate, Venue};
use tracing::debug;

pub struct HyperliquidAdapter {
    pub info_url: String, // "https://api.hyperliquid.xyz/info"
}

impl HyperliquidAdapter {
    pub fn new(info_url: &str) -> Self {
        Self { info_url: info_url.to_string() }
    }
}

/// Oracle price first, then mark, then mid.
pub fn price(ctx: &AssetCtx) -> Option<f64> {
    ctx.oracle_px.or(ctx.mark_px).or(ctx.mid_px)
}

#[async_trait::async_trait]
impl VenueAdapter for HyperliquidAdapter {
    type Market = PerpMarket;

    fn venue(&self) -> Venue {
        Venue::Hyperliquid
    }

    async fn fetch_markets(&self, transport: &dyn Transport) -> Result<Vec<PerpMarket>, AdapterError> {
        let body = serde_json::json!({"type": "metaAndAssetCtxs"});
        let js = transport.post_json(&self.info_url, &body).await?;
        let parsed: MetaAndAssetCtxs = serde_json::from_value(js)
            .map_err(|e| AdapterError::payload(Venue::Hyperliquid, e))?;
        let markets = parsed.into_markets().map_err(|e| AdapterError::payload(Venue::Hyperliquid, e))?;
        debug!(universe = markets.len(), "hyperliquid universe fetched");
        Ok(markets)
    }

    fn normalize(&self, m: &PerpMarket, date: &SnapshotDate) -> Option<CanonicalRow> {
        let name = m.asset.name.trim().to_uppercase();
        if name.is_empty() {
            return None;
        }
        let metrics = MarketMetrics {
            market_type: MarketType::Cross,
            leverage_max: m.asset.max_leverage,
            price_usd: price(&m.ctx),
            volume_24h_usd: m.ctx.day_ntl_vlm,
            open_interest_base: m.ctx.open_interest,
        };
        Some(CanonicalRow::from_metrics(Venue::Hyperliquid, &format!("{name}-USD"), date, metrics))
    }
}
