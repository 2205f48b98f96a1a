// Types for REST /info -> { "type": "metaAndAssetCtxs" }
//
// The response is `[ {"universe": [...]}, [ctx, ...] ]`; some proxies return the object form
// `{"universe": [...], "assetCtxs": [...]}`. universe[i] pairs with ctx[i].
use serde::Deserialize;
use serde_json::Value;

use crate::schema::normalize::blank;

#[derive(Debug, Default, Deserialize)]
pub struct PerpMeta {
    pub universe: Vec<PerpAsset>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerpAsset {
    #[serde(default)]
    pub name: String, // e.g. "ETH"
    #[serde(default, with = "blank::int")]
    pub max_leverage: Option<i64>,
    // szDecimals, onlyIsolated, isDelisted are ignored for now
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetCtx {
    #[serde(default, with = "blank::float")]
    pub oracle_px: Option<f64>,
    #[serde(default, with = "blank::float")]
    pub mark_px: Option<f64>,
    #[serde(default, with = "blank::float")]
    pub mid_px: Option<f64>,
    #[serde(default, with = "blank::float")]
    pub day_ntl_vlm: Option<f64>,
    /// Base units.
    #[serde(default, with = "blank::float")]
    pub open_interest: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MetaAndAssetCtxs {
    /// `[meta, ctxs, ...]`; elements past the second are ignored.
    Array(Vec<Value>),
    Object {
        universe: Vec<PerpAsset>,
        #[serde(default, rename = "assetCtxs")]
        asset_ctxs: Vec<AssetCtx>,
    },
}

/// One universe entry with its (possibly empty) context.
#[derive(Debug, Default)]
pub struct PerpMarket {
    pub asset: PerpAsset,
    pub ctx: AssetCtx,
}

impl MetaAndAssetCtxs {
    pub fn into_markets(self) -> Result<Vec<PerpMarket>, String> {
        let (universe, ctxs) = match self {
            MetaAndAssetCtxs::Array(items) => {
                let mut items = items.into_iter();
                let (Some(meta), Some(ctxs)) = (items.next(), items.next()) else {
                    return Err("expected [meta, assetCtxs]".to_string());
                };
                let meta: PerpMeta = serde_json::from_value(meta).map_err(|e| format!("meta: {e}"))?;
                let ctxs: Vec<AssetCtx> =
                    serde_json::from_value(ctxs).map_err(|e| format!("assetCtxs: {e}"))?;
                (meta.universe, ctxs)
            }
            MetaAndAssetCtxs::Object { universe, asset_ctxs } => (universe, asset_ctxs),
        };
        Ok(universe
            .into_iter()
            .enumerate()
            .map(|(i, asset)| PerpMarket { asset, ctx: ctxs.get(i).cloned().unwrap_or_default() })
            .collect())
    }
}
