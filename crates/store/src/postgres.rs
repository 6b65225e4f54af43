use std::collections::HashMap;

use async_trait::async_trait;
use common::{
    CartId, Money, OrderId, OrderItemId, Page, PageRequest, PaymentId, ProductId, UserId, VendorId,
};
use domain::{
    Address, CardDetails, Cart, CartLine, Charges, InventoryItem, NewOrder, Order, OrderItem,
    OrderNumber, Payment, ProductSnapshot, Status,
};
use sqlx::{PgPool, Postgres, Row, postgres::PgPoolOptions, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{OrderFilter, Store, Transaction},
};

const PRODUCT_COLUMNS: &str = "id, vendor_id, name, sku, image_url, price_cents, stock_quantity, \
     sold_count, status, low_stock_threshold";

const ORDER_COLUMNS: &str = "id, user_id, order_number, status, shipping_cents, tax_cents, \
     discount_cents, coupon_code, shipping_name, shipping_phone, shipping_line, shipping_city, \
     shipping_state, shipping_zip, shipping_country, billing_name, billing_phone, billing_line, \
     billing_city, billing_state, billing_zip, billing_country, notes, tracking_number, \
     shipping_carrier, created_at, updated_at";

const ORDER_ITEM_COLUMNS: &str = "id, order_id, product_id, vendor_id, product_name, product_sku, \
     product_image_url, quantity, unit_price_cents, discount_cents, tax_cents, fulfillment_status";

const PAYMENT_COLUMNS: &str = "id, order_id, transaction_id, payment_method, payment_provider, \
     amount_cents, currency, status, paid_at, refunded_at, refund_amount_cents, refund_reason, \
     gateway_response, failure_reason, card_last_four, card_brand, billing_email, created_at, \
     updated_at";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Registers a user row so carts and orders can reference it.
    pub async fn register_user(&self, user_id: UserId, email: &str) -> Result<()> {
        sqlx::query("INSERT INTO users (id, email) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
            .bind(user_id.as_uuid())
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;
        Ok(())
    }

    /// Inserts or replaces a catalog product.
    pub async fn upsert_product(&self, product: &InventoryItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, vendor_id, name, sku, image_url, price_cents, stock_quantity,
                                  sold_count, status, low_stock_threshold)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                vendor_id = EXCLUDED.vendor_id,
                name = EXCLUDED.name,
                sku = EXCLUDED.sku,
                image_url = EXCLUDED.image_url,
                price_cents = EXCLUDED.price_cents,
                stock_quantity = EXCLUDED.stock_quantity,
                sold_count = EXCLUDED.sold_count,
                status = EXCLUDED.status,
                low_stock_threshold = EXCLUDED.low_stock_threshold,
                updated_at = NOW()
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.vendor_id.as_uuid())
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.image_url)
        .bind(product.price.cents())
        .bind(to_i32(product.stock_quantity)?)
        .bind(to_i32(product.sold_count)?)
        .bind(product.status.as_str())
        .bind(to_i32(product.low_stock_threshold)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction { tx })
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Transaction over [`PostgresStore`]. Rolls back when dropped uncommitted.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

/// Turns unique-constraint failures into [`StoreError::UniqueViolation`].
fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
        && let Some(constraint) = db_err.constraint()
    {
        return StoreError::UniqueViolation {
            constraint: constraint.to_string(),
        };
    }
    StoreError::Database(e)
}

fn to_i32(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::Decode(format!("value out of range: {value}")))
}

fn to_u32(row: &PgRow, column: &str) -> Result<u32> {
    let value: i32 = row.try_get(column)?;
    u32::try_from(value)
        .map_err(|_| StoreError::Decode(format!("{column} is negative: {value}")))
}

fn money(row: &PgRow, column: &str) -> Result<Money> {
    Ok(Money::from_cents(row.try_get::<i64, _>(column)?))
}

fn row_to_product(row: &PgRow) -> Result<InventoryItem> {
    let status: String = row.try_get("status")?;
    Ok(InventoryItem {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        vendor_id: VendorId::from_uuid(row.try_get::<Uuid, _>("vendor_id")?),
        name: row.try_get("name")?,
        sku: row.try_get("sku")?,
        image_url: row.try_get("image_url")?,
        price: money(row, "price_cents")?,
        stock_quantity: to_u32(row, "stock_quantity")?,
        sold_count: to_u32(row, "sold_count")?,
        status: status.parse()?,
        low_stock_threshold: to_u32(row, "low_stock_threshold")?,
    })
}

fn row_to_address(row: &PgRow, prefix: &str) -> Result<Address> {
    let field = |name: &str| -> Result<String> {
        Ok(row.try_get::<String, _>(format!("{prefix}_{name}").as_str())?)
    };
    Ok(Address {
        name: field("name")?,
        phone: field("phone")?,
        line: field("line")?,
        city: field("city")?,
        state: field("state")?,
        zip: field("zip")?,
        country: field("country")?,
    })
}

fn row_to_order_item(row: &PgRow) -> Result<OrderItem> {
    let snapshot = ProductSnapshot {
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        vendor_id: VendorId::from_uuid(row.try_get::<Uuid, _>("vendor_id")?),
        product_name: row.try_get("product_name")?,
        product_sku: row.try_get("product_sku")?,
        product_image_url: row.try_get("product_image_url")?,
    };
    let status: String = row.try_get("fulfillment_status")?;
    let mut item = OrderItem::new(
        snapshot,
        to_u32(row, "quantity")?,
        money(row, "unit_price_cents")?,
    )?
    .with_adjustments(money(row, "discount_cents")?, money(row, "tax_cents")?)
    .with_id(OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?));
    item.fulfillment_status = Status::parse(&status)?;
    Ok(item)
}

fn row_to_order(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let header = NewOrder {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        order_number: OrderNumber::new(row.try_get::<String, _>("order_number")?),
        charges: Charges {
            shipping: money(row, "shipping_cents")?,
            tax: money(row, "tax_cents")?,
            discount: money(row, "discount_cents")?,
        },
        coupon_code: row.try_get("coupon_code")?,
        shipping_address: row_to_address(row, "shipping")?,
        billing_address: row_to_address(row, "billing")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    };
    let mut order = Order::new(header, items);
    order.status = Status::parse(&status)?;
    order.tracking_number = row.try_get("tracking_number")?;
    order.shipping_carrier = row.try_get("shipping_carrier")?;
    order.updated_at = row.try_get("updated_at")?;
    Ok(order)
}

fn row_to_payment(row: &PgRow) -> Result<Payment> {
    let status: String = row.try_get("status")?;
    let refund_amount: Option<i64> = row.try_get("refund_amount_cents")?;
    Ok(Payment {
        id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        transaction_id: row.try_get("transaction_id")?,
        payment_method: row.try_get("payment_method")?,
        payment_provider: row.try_get("payment_provider")?,
        amount: money(row, "amount_cents")?,
        currency: row.try_get("currency")?,
        status: Status::parse(&status)?,
        paid_at: row.try_get("paid_at")?,
        refunded_at: row.try_get("refunded_at")?,
        refund_amount: refund_amount.map(Money::from_cents),
        refund_reason: row.try_get("refund_reason")?,
        gateway_response: row.try_get("gateway_response")?,
        failure_reason: row.try_get("failure_reason")?,
        card: CardDetails {
            card_last_four: row.try_get("card_last_four")?,
            card_brand: row.try_get("card_brand")?,
            billing_email: row.try_get("billing_email")?,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl PostgresTransaction {
    /// Loads the items of the given order rows and assembles full orders,
    /// keeping the row order.
    async fn hydrate_orders(&mut self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let item_rows = sqlx::query(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY position ASC"
        ))
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in &item_rows {
            let order_id: Uuid = row.try_get("order_id")?;
            items
                .entry(order_id)
                .or_default()
                .push(row_to_order_item(row)?);
        }

        rows.iter()
            .zip(ids)
            .map(|(row, id)| row_to_order(row, items.remove(&id).unwrap_or_default()))
            .collect()
    }

    async fn hydrate_order(&mut self, row: Option<PgRow>) -> Result<Option<Order>> {
        match row {
            Some(row) => Ok(self.hydrate_orders(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn fetch_product(&mut self, id: ProductId, lock: bool) -> Result<Option<InventoryItem>> {
        let lock_clause = if lock { " FOR UPDATE" } else { "" };
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1{lock_clause}"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn fetch_order(&mut self, id: OrderId, lock: bool) -> Result<Option<Order>> {
        let lock_clause = if lock { " FOR UPDATE" } else { "" };
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1{lock_clause}"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        self.hydrate_order(row).await
    }

    async fn fetch_payment(&mut self, id: PaymentId, lock: bool) -> Result<Option<Payment>> {
        let lock_clause = if lock { " FOR UPDATE" } else { "" };
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1{lock_clause}"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(row_to_payment).transpose()
    }

    async fn insert_cart_lines(&mut self, cart: &Cart) -> Result<()> {
        for (position, line) in cart.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO cart_items (cart_id, product_id, position, quantity, unit_price_cents, added_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(cart.id.as_uuid())
            .bind(line.product_id.as_uuid())
            .bind(position as i32)
            .bind(to_i32(line.quantity)?)
            .bind(line.unit_price.cents())
            .bind(line.added_at)
            .execute(&mut *self.tx)
            .await
            .map_err(map_write_error)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn user_exists(&mut self, user_id: UserId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id.as_uuid())
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(exists)
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<InventoryItem>> {
        self.fetch_product(id, false).await
    }

    async fn product_for_update(&mut self, id: ProductId) -> Result<Option<InventoryItem>> {
        self.fetch_product(id, true).await
    }

    async fn products(&mut self, ids: &[ProductId]) -> Result<Vec<InventoryItem>> {
        let uuids: Vec<Uuid> = ids.iter().map(ProductId::as_uuid).collect();
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(&uuids)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn adjust_stock(
        &mut self,
        id: ProductId,
        stock_delta: i64,
        sold_delta: i64,
    ) -> Result<Option<InventoryItem>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + $2,
                sold_count = GREATEST(sold_count + $3, 0),
                updated_at = NOW()
            WHERE id = $1 AND stock_quantity + $2 >= 0
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(stock_delta)
        .bind(sold_delta)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn cart_for_update(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, coupon_code, discount_cents, created_at, updated_at
            FROM carts
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let cart_id: Uuid = row.try_get("id")?;
        let line_rows = sqlx::query(
            r#"
            SELECT product_id, quantity, unit_price_cents, added_at
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(cart_id)
        .fetch_all(&mut *self.tx)
        .await?;

        let lines = line_rows
            .iter()
            .map(|line| -> Result<CartLine> {
                Ok(CartLine {
                    product_id: ProductId::from_uuid(line.try_get::<Uuid, _>("product_id")?),
                    quantity: to_u32(line, "quantity")?,
                    unit_price: money(line, "unit_price_cents")?,
                    added_at: line.try_get("added_at")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Cart {
            id: CartId::from_uuid(cart_id),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            lines,
            coupon_code: row.try_get("coupon_code")?,
            discount: money(&row, "discount_cents")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    async fn insert_cart(&mut self, cart: &Cart) -> Result<Cart> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO carts (id, user_id, coupon_code, discount_cents, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(cart.id.as_uuid())
        .bind(cart.user_id.as_uuid())
        .bind(&cart.coupon_code)
        .bind(cart.discount.cents())
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?
        .rows_affected();

        if inserted == 1 {
            self.insert_cart_lines(cart).await?;
        }
        self.cart_for_update(cart.user_id)
            .await?
            .ok_or_else(|| StoreError::Decode(format!("cart for user {} not found", cart.user_id)))
    }

    async fn save_cart(&mut self, cart: &Cart) -> Result<()> {
        sqlx::query(
            "UPDATE carts SET coupon_code = $2, discount_cents = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(cart.id.as_uuid())
        .bind(&cart.coupon_code)
        .bind(cart.discount.cents())
        .bind(cart.updated_at)
        .execute(&mut *self.tx)
        .await?;

        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart.id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        self.insert_cart_lines(cart).await
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let totals = order.totals();
        let shipping = &order.shipping_address;
        let billing = &order.billing_address;
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, order_number, status, subtotal_cents, shipping_cents, tax_cents,
                discount_cents, total_cents, coupon_code,
                shipping_name, shipping_phone, shipping_line, shipping_city, shipping_state,
                shipping_zip, shipping_country,
                billing_name, billing_phone, billing_line, billing_city, billing_state,
                billing_zip, billing_country,
                notes, tracking_number, shipping_carrier, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.order_number.as_str())
        .bind(order.status.as_str())
        .bind(totals.subtotal.cents())
        .bind(totals.shipping_cost.cents())
        .bind(totals.tax_amount.cents())
        .bind(totals.discount_amount.cents())
        .bind(totals.total_amount.cents())
        .bind(&order.coupon_code)
        .bind(&shipping.name)
        .bind(&shipping.phone)
        .bind(&shipping.line)
        .bind(&shipping.city)
        .bind(&shipping.state)
        .bind(&shipping.zip)
        .bind(&shipping.country)
        .bind(&billing.name)
        .bind(&billing.phone)
        .bind(&billing.line)
        .bind(&billing.city)
        .bind(&billing.state)
        .bind(&billing.zip)
        .bind(&billing.country)
        .bind(&order.notes)
        .bind(&order.tracking_number)
        .bind(&order.shipping_carrier)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        for (position, item) in order.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, position, product_id, vendor_id, product_name, product_sku,
                    product_image_url, quantity, unit_price_cents, discount_cents, tax_cents,
                    total_price_cents, fulfillment_status
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(order.id.as_uuid())
            .bind(position as i32)
            .bind(item.product.product_id.as_uuid())
            .bind(item.product.vendor_id.as_uuid())
            .bind(&item.product.product_name)
            .bind(&item.product.product_sku)
            .bind(&item.product.product_image_url)
            .bind(to_i32(item.quantity)?)
            .bind(item.unit_price.cents())
            .bind(item.discount().cents())
            .bind(item.tax().cents())
            .bind(item.total_price().cents())
            .bind(item.fulfillment_status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(map_write_error)?;
        }
        Ok(())
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.fetch_order(id, false).await
    }

    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.fetch_order(id, true).await
    }

    async fn order_by_number(&mut self, number: &OrderNumber) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"
        ))
        .bind(number.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;
        self.hydrate_order(row).await
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, tracking_number = $3, shipping_carrier = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(&order.tracking_number)
        .bind(&order.shipping_carrier)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        for item in order.items() {
            sqlx::query("UPDATE order_items SET fulfillment_status = $2 WHERE id = $1")
                .bind(item.id.as_uuid())
                .bind(item.fulfillment_status.as_str())
                .execute(&mut *self.tx)
                .await?;
        }
        Ok(())
    }

    async fn list_orders(&mut self, filter: OrderFilter, page: PageRequest) -> Result<Page<Order>> {
        let mut conditions = String::from(" WHERE 1=1");
        let mut param_count = 0;

        if filter.owner.is_some() {
            param_count += 1;
            conditions.push_str(&format!(" AND user_id = ${param_count}"));
        }
        if filter.status.is_some() {
            param_count += 1;
            conditions.push_str(&format!(" AND status = ${param_count}"));
        }

        let count_sql = format!("SELECT COUNT(*) FROM orders{conditions}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(owner) = filter.owner {
            count_query = count_query.bind(owner.as_uuid());
        }
        if let Some(status) = filter.status {
            count_query = count_query.bind(status.as_str());
        }
        let total = count_query.fetch_one(&mut *self.tx).await?;

        let select_sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders{conditions} ORDER BY created_at DESC, id DESC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );
        let mut select_query = sqlx::query(&select_sql);
        if let Some(owner) = filter.owner {
            select_query = select_query.bind(owner.as_uuid());
        }
        if let Some(status) = filter.status {
            select_query = select_query.bind(status.as_str());
        }
        let rows = select_query
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(&mut *self.tx)
            .await?;

        let orders = self.hydrate_orders(rows).await?;
        Ok(Page::new(orders, page, u64::try_from(total).unwrap_or_default()))
    }

    async fn payment(&mut self, id: PaymentId) -> Result<Option<Payment>> {
        self.fetch_payment(id, false).await
    }

    async fn payment_for_update(&mut self, id: PaymentId) -> Result<Option<Payment>> {
        self.fetch_payment(id, true).await
    }

    async fn payment_by_order(&mut self, order_id: OrderId) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(row_to_payment).transpose()
    }

    async fn payment_by_transaction(&mut self, transaction_id: &str) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(row_to_payment).transpose()
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO payments ({PAYMENT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19)
            "#
        ))
        .bind(payment.id.as_uuid())
        .bind(payment.order_id.as_uuid())
        .bind(&payment.transaction_id)
        .bind(&payment.payment_method)
        .bind(&payment.payment_provider)
        .bind(payment.amount.cents())
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(payment.paid_at)
        .bind(payment.refunded_at)
        .bind(payment.refund_amount.map(|m| m.cents()))
        .bind(&payment.refund_reason)
        .bind(&payment.gateway_response)
        .bind(&payment.failure_reason)
        .bind(&payment.card.card_last_four)
        .bind(&payment.card.card_brand)
        .bind(&payment.card.billing_email)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE payments
            SET transaction_id = $2, payment_method = $3, payment_provider = $4,
                amount_cents = $5, currency = $6, status = $7, paid_at = $8, refunded_at = $9,
                refund_amount_cents = $10, refund_reason = $11, gateway_response = $12,
                failure_reason = $13, card_last_four = $14, card_brand = $15,
                billing_email = $16, updated_at = $17
            WHERE id = $1
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(&payment.transaction_id)
        .bind(&payment.payment_method)
        .bind(&payment.payment_provider)
        .bind(payment.amount.cents())
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(payment.paid_at)
        .bind(payment.refunded_at)
        .bind(payment.refund_amount.map(|m| m.cents()))
        .bind(&payment.refund_reason)
        .bind(&payment.gateway_response)
        .bind(&payment.failure_reason)
        .bind(&payment.card.card_last_four)
        .bind(&payment.card.card_brand)
        .bind(&payment.card.billing_email)
        .bind(payment.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
