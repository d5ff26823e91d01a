//! Seeded generation of the demo dataset
//!
//! Produces categories, products, customers, orders (with baskets) and
//! reviews whose reference fields point at existing records. The same seed
//! and anchor always produce the same dataset.

use crate::core::Record;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::collections::HashMap;

const CATEGORIES: [&str; 12] = [
    "animals", "beard", "business", "cars", "flowers", "food", "nature", "people", "sports",
    "tech", "travel", "water",
];

const ADJECTIVES: [&str; 10] = [
    "Golden", "Silent", "Wild", "Urban", "Misty", "Bright", "Lonely", "Crimson", "Frozen", "Lazy",
];

const NOUNS: [&str; 10] = [
    "Harbor", "Meadow", "Skyline", "Forest", "Street", "Lagoon", "Canyon", "Garden", "Summit",
    "Market",
];

const FIRST_NAMES: [&str; 12] = [
    "Ada", "Bruno", "Chloe", "Dmitri", "Elena", "Farid", "Greta", "Hugo", "Ines", "Jonas", "Keiko",
    "Liam",
];

const LAST_NAMES: [&str; 10] = [
    "Martin", "Bernard", "Dubois", "Thomas", "Robert", "Richard", "Petit", "Durand", "Leroy",
    "Moreau",
];

const CITIES: [&str; 8] = [
    "Nantes", "Lyon", "Lille", "Bordeaux", "Paris", "Rennes", "Toulouse", "Nice",
];

const COMMENTS: [&str; 6] = [
    "Lovely print, the colors are exactly as shown.",
    "Arrived quickly and well packaged.",
    "Smaller than I expected.",
    "Great value, will order again.",
    "The paper quality could be better.",
    "My favourite poster so far.",
];

const GROUPS: [&str; 4] = ["collector", "regular", "compulsive", "reviewer"];

/// Sizes and seed for a generated dataset
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub seed: u64,
    pub customers: usize,
    pub products: usize,
    pub orders: usize,
    pub reviews: usize,
    /// "Now" for the generated timeline
    pub anchor: DateTime<Utc>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            customers: 50,
            products: 40,
            orders: 60,
            reviews: 40,
            anchor: Utc::now(),
        }
    }
}

impl GeneratorOptions {
    /// Tiny dataset for tests
    pub fn small() -> Self {
        Self {
            customers: 8,
            products: 6,
            orders: 10,
            reviews: 6,
            ..Default::default()
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn stamp(date: DateTime<Utc>) -> String {
    date.to_rfc3339()
}

fn number(record: &Record, field: &str) -> f64 {
    record.get(field).and_then(Value::as_f64).unwrap_or(0.0)
}

fn pick<'a>(rng: &mut StdRng, items: &'a [&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

/// Generate every collection of the demo
pub fn generate(options: &GeneratorOptions) -> HashMap<String, Vec<Record>> {
    let mut rng = StdRng::seed_from_u64(options.seed);

    let categories = generate_categories();
    let mut products = generate_products(&mut rng, options.products);
    let mut customers = generate_customers(&mut rng, options);
    let orders = generate_orders(&mut rng, options, &mut customers, &mut products);
    let reviews = generate_reviews(&mut rng, options, &orders, &mut customers);

    let mut collections = HashMap::new();
    collections.insert("categories".to_string(), categories);
    collections.insert("products".to_string(), products);
    collections.insert("customers".to_string(), customers);
    collections.insert("orders".to_string(), orders);
    collections.insert("reviews".to_string(), reviews);
    collections
}

fn generate_categories() -> Vec<Record> {
    CATEGORIES
        .iter()
        .enumerate()
        .map(|(i, name)| Record::new().field("id", i as i64 + 1).field("name", *name))
        .collect()
}

fn generate_products(rng: &mut StdRng, count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            let id = i as i64 + 1;
            let category_index = i % CATEGORIES.len();
            let category = CATEGORIES[category_index];
            let reference = format!("{} {}", pick(rng, &ADJECTIVES), pick(rng, &NOUNS));
            Record::new()
                .field("id", id)
                .field("category_id", category_index as i64 + 1)
                .field("reference", reference.clone())
                .field("width", round2(rng.gen_range(10.0..40.0)))
                .field("height", round2(rng.gen_range(10.0..40.0)))
                .field("price", round2(rng.gen_range(15.0..70.0)))
                .field(
                    "thumbnail",
                    format!("https://marmelab.com/posters/{}-{}.jpeg", category, id),
                )
                .field(
                    "image",
                    format!("https://marmelab.com/posters/{}-{}-large.jpeg", category, id),
                )
                .field(
                    "description",
                    format!("{}: a {} poster printed on matte paper.", reference, category),
                )
                .field("stock", rng.gen_range(0..=150))
                .field("sales", 0)
        })
        .collect()
}

fn generate_customers(rng: &mut StdRng, options: &GeneratorOptions) -> Vec<Record> {
    (0..options.customers)
        .map(|i| {
            let id = i as i64 + 1;
            let first_name = pick(rng, &FIRST_NAMES);
            let last_name = pick(rng, &LAST_NAMES);
            let first_seen = options.anchor - Duration::days(rng.gen_range(30..=365));
            let last_seen = options.anchor - Duration::days(rng.gen_range(0..30));
            let birthday = options.anchor - Duration::days(rng.gen_range(20 * 365..70 * 365));
            let mut groups = Vec::new();
            if rng.gen_bool(0.2) {
                groups.push(pick(rng, &GROUPS[..3]));
            }
            Record::new()
                .field("id", id)
                .field("first_name", first_name)
                .field("last_name", last_name)
                .field(
                    "email",
                    format!(
                        "{}.{}{}@example.com",
                        first_name.to_lowercase(),
                        last_name.to_lowercase(),
                        id
                    ),
                )
                .field(
                    "address",
                    format!("{} rue {}", rng.gen_range(1..200), pick(rng, &NOUNS)),
                )
                .field("city", pick(rng, &CITIES))
                .field("zipcode", format!("{:05}", rng.gen_range(1000..99999)))
                .field("birthday", stamp(birthday))
                .field("first_seen", stamp(first_seen))
                .field("last_seen", stamp(last_seen))
                .field("has_ordered", false)
                .field("latest_purchase", Value::Null)
                .field("has_newsletter", rng.gen_bool(0.3))
                .field("groups", json!(groups))
                .field("nb_orders", 0)
                .field("total_spent", 0.0)
        })
        .collect()
}

fn generate_orders(
    rng: &mut StdRng,
    options: &GeneratorOptions,
    customers: &mut [Record],
    products: &mut [Record],
) -> Vec<Record> {
    if customers.is_empty() || products.is_empty() {
        return Vec::new();
    }

    let mut orders = Vec::with_capacity(options.orders);
    for i in 0..options.orders {
        let customer_index = rng.gen_range(0..customers.len());
        let age_days = rng.gen_range(0..90);
        let date = options.anchor - Duration::days(age_days);

        let mut product_indexes: Vec<usize> = (0..products.len()).collect();
        product_indexes.shuffle(rng);
        let item_count = rng.gen_range(1..=products.len().min(4));

        let mut basket = Vec::with_capacity(item_count);
        let mut total_ex_taxes = 0.0;
        for &index in &product_indexes[..item_count] {
            let quantity = rng.gen_range(1..=3);
            let product = &mut products[index];
            total_ex_taxes += number(product, "price") * quantity as f64;
            let sales = number(product, "sales") as i64 + quantity;
            product.insert("sales", sales);
            basket.push(json!({ "product_id": product.id().map(|id| id.to_value()), "quantity": quantity }));
        }

        let total_ex_taxes = round2(total_ex_taxes);
        let delivery_fees = round2(rng.gen_range(3.0..8.0));
        let tax_rate = *[0.12, 0.17, 0.2].choose(rng).unwrap_or(&0.2);
        let taxes = round2((total_ex_taxes + delivery_fees) * tax_rate);
        let total = round2(total_ex_taxes + delivery_fees + taxes);

        let status = if age_days > 30 {
            if rng.gen_bool(0.1) {
                "cancelled"
            } else {
                "delivered"
            }
        } else {
            "ordered"
        };
        let reference: String = (0..6)
            .map(|_| char::from(b'A' + rng.gen_range(0..26)))
            .collect();

        let customer = &mut customers[customer_index];
        let customer_id = customer.id().map(|id| id.to_value()).unwrap_or(Value::Null);
        if status != "cancelled" {
            customer.insert("has_ordered", true);
            customer.insert("nb_orders", number(customer, "nb_orders") as i64 + 1);
            customer.insert("total_spent", round2(number(customer, "total_spent") + total));
            let latest = customer
                .get("latest_purchase")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&Utc));
            if latest.map_or(true, |latest| latest < date) {
                customer.insert("latest_purchase", stamp(date));
            }
        }

        orders.push(
            Record::new()
                .field("id", i as i64 + 1)
                .field("reference", reference)
                .field("date", stamp(date))
                .field("customer_id", customer_id)
                .field("basket", Value::Array(basket))
                .field("total_ex_taxes", total_ex_taxes)
                .field("delivery_fees", delivery_fees)
                .field("tax_rate", tax_rate)
                .field("taxes", taxes)
                .field("total", total)
                .field("status", status)
                .field("returned", status == "delivered" && rng.gen_bool(0.1)),
        );
    }
    orders
}

fn generate_reviews(
    rng: &mut StdRng,
    options: &GeneratorOptions,
    orders: &[Record],
    customers: &mut [Record],
) -> Vec<Record> {
    let delivered: Vec<&Record> = orders
        .iter()
        .filter(|o| o.get("status") == Some(&json!("delivered")))
        .collect();
    if delivered.is_empty() {
        return Vec::new();
    }

    (0..options.reviews)
        .map(|i| {
            let order = delivered[rng.gen_range(0..delivered.len())];
            let product_id = order
                .get("basket")
                .and_then(Value::as_array)
                .and_then(|items| items.choose(rng))
                .and_then(|item| item.get("product_id").cloned())
                .unwrap_or(Value::Null);
            let customer_id = order.get("customer_id").cloned().unwrap_or(Value::Null);

            let age_days = rng.gen_range(0..30);
            let status = if age_days > 7 {
                if rng.gen_bool(0.8) {
                    "accepted"
                } else {
                    "rejected"
                }
            } else {
                "pending"
            };

            if let Some(customer) = customers
                .iter_mut()
                .find(|c| c.get("id") == Some(&customer_id))
            {
                let mut groups: Vec<Value> = customer
                    .get("groups")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                if !groups.contains(&json!("reviewer")) {
                    groups.push(json!("reviewer"));
                    customer.insert("groups", Value::Array(groups));
                }
            }

            Record::new()
                .field("id", i as i64 + 1)
                .field("date", stamp(options.anchor - Duration::days(age_days)))
                .field("status", status)
                .field("order_id", order.get("id").cloned().unwrap_or(Value::Null))
                .field("product_id", product_id)
                .field("customer_id", customer_id)
                .field("rating", rng.gen_range(1..=5))
                .field("comment", pick(rng, &COMMENTS))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(records: &[Record]) -> Vec<Value> {
        records.iter().filter_map(|r| r.get("id").cloned()).collect()
    }

    #[test]
    fn test_collection_sizes() {
        let options = GeneratorOptions::small();
        let collections = generate(&options);
        assert_eq!(collections["categories"].len(), CATEGORIES.len());
        assert_eq!(collections["products"].len(), options.products);
        assert_eq!(collections["customers"].len(), options.customers);
        assert_eq!(collections["orders"].len(), options.orders);
    }

    #[test]
    fn test_same_seed_same_dataset() {
        let options = GeneratorOptions::small();
        let a = generate(&options);
        let b = generate(&options);
        assert_eq!(a["orders"], b["orders"]);
        assert_eq!(a["customers"], b["customers"]);
    }

    #[test]
    fn test_references_resolve() {
        let collections = generate(&GeneratorOptions::default());
        let customer_ids = ids(&collections["customers"]);
        let product_ids = ids(&collections["products"]);

        for order in &collections["orders"] {
            assert!(customer_ids.contains(order.get("customer_id").unwrap()));
            for item in order.get("basket").unwrap().as_array().unwrap() {
                assert!(product_ids.contains(item.get("product_id").unwrap()));
            }
        }
        for review in &collections["reviews"] {
            assert!(product_ids.contains(review.get("product_id").unwrap()));
        }
    }

    #[test]
    fn test_order_totals_add_up() {
        let collections = generate(&GeneratorOptions::small());
        for order in &collections["orders"] {
            let expected = number(order, "total_ex_taxes") + number(order, "delivery_fees")
                + number(order, "taxes");
            assert!((number(order, "total") - expected).abs() < 0.011);
        }
    }

    #[test]
    fn test_empty_sizes() {
        let options = GeneratorOptions {
            customers: 0,
            products: 0,
            orders: 5,
            reviews: 5,
            ..Default::default()
        };
        let collections = generate(&options);
        assert!(collections["orders"].is_empty());
        assert!(collections["reviews"].is_empty());
    }
}
