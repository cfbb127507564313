#![allow(dead_code)]

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::sync::Arc;

use sky_takeout::config::Config;
use sky_takeout::entities::{
    category::{self, Kind},
    dish::{self, SaleStatus},
    primary_setup, setup_schema, user,
};
use sky_takeout::services::catalog::{DishInput, NewCategory, SetmealDishInput, SetmealInput};
use sky_takeout::services::order::SubmitOrder;
use sky_takeout::services::payment::{PaymentGateway, SimulatedGateway};
use sky_takeout::{connect, AppState};

pub const PASSWORD: &str = "Secret15";

pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<SimulatedGateway>,
    pub admin_id: i32,
    pub user_id: i32,
    pub dish_category: i32,
    pub setmeal_category: i32,
}

pub async fn setup() -> TestApp {
    let gateway = Arc::new(SimulatedGateway::new());
    let mut app = setup_with_gateway(gateway.clone()).await;
    app.gateway = gateway;
    app
}

/// Fresh in-memory database with the seeded `admin` and `user` accounts and
/// one category of each kind.
pub async fn setup_with_gateway(gateway: Arc<dyn PaymentGateway>) -> TestApp {
    let config = Config::for_tests();
    let db = connect(&config.database_url)
        .await
        .expect("Failed to open database");
    setup_schema(&db).await.expect("Failed to create schema");
    primary_setup(&db, PASSWORD)
        .await
        .expect("Failed to seed accounts");

    let state = AppState::new(db, config, gateway);
    let admin_id = user_id(&state, "admin").await;
    let user_id = user_id(&state, "user").await;

    let dish_category = create_category(&state, "Hot dishes", Kind::Dish).await;
    let setmeal_category = create_category(&state, "Lunch sets", Kind::Setmeal).await;

    TestApp {
        state,
        gateway: Arc::new(SimulatedGateway::new()),
        admin_id,
        user_id,
        dish_category,
        setmeal_category,
    }
}

async fn user_id(state: &AppState, username: &str) -> i32 {
    user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(&*state.db)
        .await
        .expect("Failed to query users")
        .expect("Seeded user missing")
        .id
}

async fn create_category(state: &AppState, name: &str, kind: Kind) -> i32 {
    let category: category::Model = state
        .catalog
        .create_category(NewCategory {
            name: name.to_owned(),
            kind,
            sort: 0,
        })
        .await
        .expect("Failed to create category");
    category.id
}

pub fn money(value: &str) -> Decimal {
    value.parse().expect("Invalid decimal literal")
}

pub fn dish_input(name: &str, category_id: i32, price: &str) -> DishInput {
    DishInput {
        name: name.to_owned(),
        category_id,
        price: money(price),
        image: format!("{name}.png"),
        description: String::new(),
        status: None,
        flavors: Vec::new(),
    }
}

impl TestApp {
    pub async fn dish(&self, name: &str, price: &str) -> dish::Model {
        self.state
            .catalog
            .create_dish(self.admin_id, dish_input(name, self.dish_category, price))
            .await
            .expect("Failed to create dish")
    }

    /// Creates a setmeal over `dishes` (one copy each), optionally enabled.
    pub async fn setmeal(&self, name: &str, price: &str, dishes: &[i32], enable: bool) -> i32 {
        let view = self
            .state
            .catalog
            .create_setmeal(
                self.admin_id,
                SetmealInput {
                    name: name.to_owned(),
                    category_id: self.setmeal_category,
                    price: money(price),
                    image: String::new(),
                    description: String::new(),
                    dishes: dishes
                        .iter()
                        .map(|&dish_id| SetmealDishInput { dish_id, copies: 1 })
                        .collect(),
                },
            )
            .await
            .expect("Failed to create setmeal");
        if enable {
            self.state
                .catalog
                .set_setmeal_status(self.admin_id, view.setmeal.id, SaleStatus::Sellable)
                .await
                .expect("Failed to enable setmeal");
        }
        view.setmeal.id
    }
}

pub fn address() -> SubmitOrder {
    SubmitOrder {
        consignee: "Ann Lee".into(),
        phone: "13800138000".into(),
        address: "12 Harbour Road".into(),
        remark: None,
    }
}
