mod common;

use sky_takeout::entities::dish::SaleStatus;
use sky_takeout::error::AppError;
use sky_takeout::services::catalog::ItemRef;

use common::{money, setup};

#[tokio::test]
async fn same_item_twice_is_one_line() {
    let app = setup().await;
    let cart = &app.state.cart;
    let dish = app.dish("Kung Pao Chicken", "28.00").await;

    cart.add_item(app.user_id, ItemRef::Dish(dish.id), Some("spicy"))
        .await
        .unwrap();
    let line = cart
        .add_item(app.user_id, ItemRef::Dish(dish.id), Some("spicy"))
        .await
        .unwrap();

    assert_eq!(line.number, 2);
    let lines = cart.list(app.user_id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].amount, money("28.00"));
    assert_eq!(lines[0].name, "Kung Pao Chicken");
}

#[tokio::test]
async fn flavor_separates_lines() {
    let app = setup().await;
    let cart = &app.state.cart;
    let dish = app.dish("Noodles", "12.50").await;

    cart.add_item(app.user_id, ItemRef::Dish(dish.id), Some("mild"))
        .await
        .unwrap();
    cart.add_item(app.user_id, ItemRef::Dish(dish.id), None)
        .await
        .unwrap();
    // Blank flavor is the same as none
    cart.add_item(app.user_id, ItemRef::Dish(dish.id), Some("  "))
        .await
        .unwrap();

    let lines = cart.list(app.user_id).await.unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].dish_flavor.as_deref(), Some("mild"));
    assert_eq!(lines[1].dish_flavor, None);
    assert_eq!(lines[1].number, 2);
}

#[tokio::test]
async fn lines_keep_insertion_order() {
    let app = setup().await;
    let cart = &app.state.cart;
    let first = app.dish("Soup", "8.00").await;
    let second = app.dish("Rice", "2.00").await;
    let set = app.setmeal("Lunch", "9.00", &[first.id, second.id], true).await;

    cart.add_item(app.user_id, ItemRef::Setmeal(set), None).await.unwrap();
    cart.add_item(app.user_id, ItemRef::Dish(second.id), None).await.unwrap();
    cart.add_item(app.user_id, ItemRef::Dish(first.id), None).await.unwrap();
    cart.add_item(app.user_id, ItemRef::Setmeal(set), None).await.unwrap();

    let lines = cart.list(app.user_id).await.unwrap();
    let order: Vec<(Option<i32>, Option<i32>)> =
        lines.iter().map(|l| (l.dish_id, l.setmeal_id)).collect();
    assert_eq!(
        order,
        vec![(None, Some(set)), (Some(second.id), None), (Some(first.id), None)]
    );
    assert_eq!(lines[0].number, 2);
}

#[tokio::test]
async fn removing_units() {
    let app = setup().await;
    let cart = &app.state.cart;
    let dish = app.dish("Dumplings", "15.00").await;
    let item = ItemRef::Dish(dish.id);

    // Nothing to remove is not an error
    assert!(cart.remove_one_unit(app.user_id, item, None).await.unwrap().is_none());

    cart.add_item(app.user_id, item, None).await.unwrap();
    cart.add_item(app.user_id, item, None).await.unwrap();

    let left = cart.remove_one_unit(app.user_id, item, None).await.unwrap();
    assert_eq!(left.map(|l| l.number), Some(1));
    assert!(cart.remove_one_unit(app.user_id, item, None).await.unwrap().is_none());
    assert!(cart.list(app.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn carts_are_per_user_and_clearable() {
    let app = setup().await;
    let cart = &app.state.cart;
    let dish = app.dish("Tea", "3.00").await;

    cart.add_item(app.user_id, ItemRef::Dish(dish.id), None).await.unwrap();
    cart.add_item(app.admin_id, ItemRef::Dish(dish.id), None).await.unwrap();

    cart.clear(app.user_id).await.unwrap();
    assert!(cart.list(app.user_id).await.unwrap().is_empty());
    assert_eq!(cart.list(app.admin_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn stopped_items_can_still_be_added() {
    let app = setup().await;
    let dish = app.dish("Fish", "40.00").await;
    app.state
        .catalog
        .set_dish_status(app.admin_id, dish.id, SaleStatus::Stopped)
        .await
        .unwrap();

    let line = app
        .state
        .cart
        .add_item(app.user_id, ItemRef::Dish(dish.id), None)
        .await
        .unwrap();
    assert_eq!(line.number, 1);

    assert!(matches!(
        app.state
            .cart
            .add_item(app.user_id, ItemRef::Dish(424242), None)
            .await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn concurrent_adds_do_not_lose_units() {
    let app = setup().await;
    let dish = app.dish("Buns", "6.00").await;
    let cart = app.state.cart.clone();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let cart = cart.clone();
        let user_id = app.user_id;
        tasks.push(tokio::spawn(async move {
            cart.add_item(user_id, ItemRef::Dish(dish.id), None).await
        }));
    }
    for task in tasks {
        task.await.expect("Task panicked").expect("Add failed");
    }

    let lines = cart.list(app.user_id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].number, 8);
}
