symbol_enum! {
    /// 4.5.8 Transaction Error
    /// Symbols used to indicate transaction errors.
    /// <type name="transaction-error" class="restricted" source="symbol" provides="error-condition">
    ///     <choice name="unknown-id" value="amqp:transaction:unknown-id"/>
    ///     <choice name="transaction-rollback" value="amqp:transaction:rollback"/>
    ///     <choice name="transaction-timeout" value="amqp:transaction:timeout"/>
    /// </type>
    pub enum TransactionError {
        /// The specified txn-id does not exist.
        UnknownId => "amqp:transaction:unknown-id",

        /// The transaction was rolled back for a reason other than a discharge request
        TransactionRollback => "amqp:transaction:rollback",

        /// The transaction timed out
        TransactionTimeout => "amqp:transaction:timeout",
    }
}
