use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::commands::{prepare, CommandFailure, CommandResult};
use storefront_core::domain::catalog::Product;
use storefront_core::domain::interaction::UserId;
use storefront_core::recommendations::{
    RecommendationEngine, RecommendationError, RecommendationRequest, RecommendationStage,
};
use storefront_db::repositories::ProductRepository;
use storefront_db::{connect_with_config, migrations, SqlCatalogStore};

#[derive(Debug, Clone)]
pub struct RecommendArgs {
    pub product_slug: String,
    pub user_id: Option<i64>,
    pub limit: Option<usize>,
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
struct RankedProduct {
    rank: usize,
    product_id: i64,
    slug: String,
    name: String,
    stage: RecommendationStage,
}

#[derive(Debug, Serialize)]
struct RecommendOutput {
    anchor: String,
    viewer: Option<i64>,
    limit: usize,
    recommendations: Vec<RankedProduct>,
}

pub fn run(args: RecommendArgs) -> CommandResult {
    let (config, runtime) = match prepare("recommend") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };
    let limit = config.recommendations.effective_limit(args.limit);

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let output = rank(SqlCatalogStore::new(pool.clone()), &args, limit).await;
        pool.close().await;
        output
    });

    match result {
        Ok(output) => {
            let message = render_message(&output);
            let data = serde_json::to_value(&output).ok();
            CommandResult::success_with_data("recommend", message, data)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("recommend", error_class, message, exit_code)
        }
    }
}

async fn rank(
    store: SqlCatalogStore,
    args: &RecommendArgs,
    limit: usize,
) -> Result<RecommendOutput, CommandFailure> {
    let anchor = store
        .find_by_slug(&args.product_slug)
        .await
        .map_err(|error| ("db_query", error.to_string(), 4u8))?
        .ok_or_else(|| {
            ("product_not_found", format!("no product with slug `{}`", args.product_slug), 7u8)
        })?;

    let request = RecommendationRequest::new(anchor.id)
        .with_viewer(args.user_id.map(UserId))
        .with_limit(limit);
    let engine = RecommendationEngine::new(store);
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let ranked = engine.recommend_with_rng(&request, &mut rng).await.map_err(|error| match error {
        RecommendationError::AnchorNotFound(_) => ("product_not_found", error.to_string(), 7u8),
        RecommendationError::Store(_) => ("db_query", error.to_string(), 4u8),
    })?;

    let mut recommendations = Vec::with_capacity(ranked.len());
    for (index, item) in ranked.items.iter().enumerate() {
        let product: Option<Product> = engine
            .source()
            .find_by_id(item.product_id)
            .await
            .map_err(|error| ("db_query", error.to_string(), 4u8))?;
        let (slug, name) = product
            .map(|product| (product.slug, product.name))
            .unwrap_or_else(|| (String::new(), format!("product {}", item.product_id)));

        recommendations.push(RankedProduct {
            rank: index + 1,
            product_id: item.product_id.0,
            slug,
            name,
            stage: item.stage,
        });
    }

    Ok(RecommendOutput { anchor: anchor.slug, viewer: args.user_id, limit, recommendations })
}

fn render_message(output: &RecommendOutput) -> String {
    if output.recommendations.is_empty() {
        return format!("no recommendations for `{}`", output.anchor);
    }

    let lines = output
        .recommendations
        .iter()
        .map(|item| {
            format!("  {}. {} ({}) [{}]", item.rank, item.name, item.slug, item.stage.as_str())
        })
        .collect::<Vec<_>>();
    format!("recommendations for `{}`:\n{}", output.anchor, lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use storefront_core::recommendations::RecommendationStage;

    use super::{render_message, RankedProduct, RecommendOutput};

    #[test]
    fn message_lists_rank_name_and_stage() {
        let output = RecommendOutput {
            anchor: "smart-watch".to_string(),
            viewer: None,
            limit: 2,
            recommendations: vec![
                RankedProduct {
                    rank: 1,
                    product_id: 1,
                    slug: "smartphone-pro-x".to_string(),
                    name: "Smartphone Pro X".to_string(),
                    stage: RecommendationStage::SameCategory,
                },
                RankedProduct {
                    rank: 2,
                    product_id: 13,
                    slug: "yoga-mat".to_string(),
                    name: "Yoga Mat".to_string(),
                    stage: RecommendationStage::Random,
                },
            ],
        };

        assert_eq!(
            render_message(&output),
            "recommendations for `smart-watch`:\n  1. Smartphone Pro X (smartphone-pro-x) [same_category]\n  2. Yoga Mat (yoga-mat) [random]"
        );
    }

    #[test]
    fn empty_result_is_reported_plainly() {
        let output = RecommendOutput {
            anchor: "only-product".to_string(),
            viewer: Some(4),
            limit: 5,
            recommendations: Vec::new(),
        };

        assert_eq!(render_message(&output), "no recommendations for `only-product`");
    }
}
